#[cfg(feature = "llm")]
mod llm_module {
    use anyhow::Result;
    use candle::{DType, Device, Tensor};
    use candle_nn::VarBuilder;
    use candle_transformers::{
        generation::LogitsProcessor,
        models::phi3::{Config as Phi3Config, Model as Phi3},
    };
    use std::path::{Path, PathBuf};
    use tokenizers::Tokenizer;
    use tracing::info;

    const MAX_NEW_TOKENS: usize = 150;
    const TEMPERATURE: f64 = 0.7;
    const TOP_P: f64 = 0.9;
    const REPEAT_PENALTY: f32 = 1.1;
    const REPEAT_LAST_N: usize = 64;
    const SEED: u64 = 299792458;

    /// Fine-tuned causal LM served from a local directory (config.json,
    /// tokenizer.json, safetensors). One inference at a time; the backend
    /// wrapping this serializes callers.
    pub struct LocalEngine {
        model: Phi3,
        tokenizer: Tokenizer,
        device: Device,
    }

    /// Resolves the safetensors files for a model directory, either a single
    /// `model.safetensors` or the sharded index layout.
    fn dir_load_safetensors(dir: &Path) -> Result<Vec<PathBuf>> {
        let single = dir.join("model.safetensors");
        if single.exists() {
            return Ok(vec![single]);
        }
        let index_file = dir.join("model.safetensors.index.json");
        let json: serde_json::Value =
            serde_json::from_reader(std::fs::File::open(&index_file)?)?;
        let weight_map = match json.get("weight_map") {
            Some(serde_json::Value::Object(map)) => map,
            _ => anyhow::bail!("no weight map in {}", index_file.display()),
        };
        let mut safetensors_files = std::collections::HashSet::new();
        for value in weight_map.values() {
            if let Some(file) = value.as_str() {
                safetensors_files.insert(dir.join(file));
            }
        }
        Ok(safetensors_files.into_iter().collect())
    }

    impl LocalEngine {
        pub fn load(model_dir: &Path) -> Result<Self> {
            let device = Device::cuda_if_available(0)?;
            info!(
                "loading local model from {} on {:?}",
                model_dir.display(),
                device
            );

            let config: Phi3Config =
                serde_json::from_slice(&std::fs::read(model_dir.join("config.json"))?)?;
            let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
                .map_err(anyhow::Error::msg)?;

            let filenames = dir_load_safetensors(model_dir)?;
            let vb =
                unsafe { VarBuilder::from_mmaped_safetensors(&filenames, DType::F32, &device)? };
            let model = Phi3::new(&config, vb)?;

            Ok(Self {
                model,
                tokenizer,
                device,
            })
        }

        /// Runs one full generation. The model-specific prompt template is
        /// applied here, matching how the model was fine-tuned.
        pub fn generate(&mut self, prompt: &str) -> Result<String> {
            let formatted = format!("Generate content: {}\n\nOutput:", prompt);
            let mut output = String::new();
            self.generate_streaming(&formatted, |text| {
                output.push_str(&text);
                Ok(())
            })?;
            Ok(output.trim().to_string())
        }

        fn generate_streaming<F>(&mut self, prompt: &str, mut callback: F) -> Result<()>
        where
            F: FnMut(String) -> Result<()>,
        {
            self.model.clear_kv_cache();
            let mut logits_processor =
                LogitsProcessor::new(SEED, Some(TEMPERATURE), Some(TOP_P));
            let tokens = self
                .tokenizer
                .encode(prompt, true)
                .map_err(anyhow::Error::msg)?;
            if tokens.is_empty() {
                anyhow::bail!("empty prompt")
            }
            let mut tokens = tokens.get_ids().to_vec();
            let eos_token = match self.tokenizer.token_to_id("<|endoftext|>") {
                Some(token) => token,
                None => anyhow::bail!("cannot find the endoftext token"),
            };

            for index in 0..MAX_NEW_TOKENS {
                let context_size = if index > 0 { 1 } else { tokens.len() };
                let start_pos = tokens.len().saturating_sub(context_size);
                let ctxt = &tokens[start_pos..];
                let input = Tensor::new(ctxt, &self.device)?.unsqueeze(0)?;
                let logits = self.model.forward(&input, start_pos)?;
                let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;

                let logits = if REPEAT_PENALTY == 1. {
                    logits
                } else {
                    let start_at = tokens.len().saturating_sub(REPEAT_LAST_N);
                    candle_transformers::utils::apply_repeat_penalty(
                        &logits,
                        REPEAT_PENALTY,
                        &tokens[start_at..],
                    )?
                };

                let logits = if logits.dims().len() > 1 {
                    logits.squeeze(0)?
                } else {
                    logits
                };

                let next_token = logits_processor.sample(&logits)?;
                tokens.push(next_token);
                if next_token == eos_token {
                    break;
                }
                if let Ok(text) = self.tokenizer.decode(&[next_token], false) {
                    callback(text)?;
                }
            }

            Ok(())
        }
    }
}

#[cfg(feature = "llm")]
pub use llm_module::*;
