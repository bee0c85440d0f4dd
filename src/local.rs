use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::backend::{GenerationBackend, GenerationConfig, TextFragmentStream};

/// Lifecycle of the lazily loaded local model. Loading happens at most once
/// per process; a failed load is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl ModelState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ModelState::Loading,
            2 => ModelState::Ready,
            3 => ModelState::Failed,
            _ => ModelState::Uninitialized,
        }
    }
}

/// Locally hosted model backend. The artifact is loaded lazily on first use;
/// concurrent first-use requests queue on the load lock so only one load ever
/// runs. Without the `llm` feature the load always fails and the backend
/// reports unavailable.
pub struct LocalBackend {
    model_dir: PathBuf,
    state: AtomicU8,
    // Serializes the load and, with it, the state transitions.
    load_lock: Mutex<()>,
    #[cfg(feature = "llm")]
    engine: Mutex<Option<crate::llm::LocalEngine>>,
}

impl LocalBackend {
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            state: AtomicU8::new(ModelState::Uninitialized as u8),
            load_lock: Mutex::new(()),
            #[cfg(feature = "llm")]
            engine: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ModelState {
        ModelState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: ModelState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    async fn ensure_loaded(&self) -> Result<()> {
        match self.state() {
            ModelState::Ready => return Ok(()),
            ModelState::Failed => {
                return Err(anyhow!(
                    "local model previously failed to load, not retrying"
                ))
            }
            _ => {}
        }

        let _guard = self.load_lock.lock().await;
        // Another request may have finished the load while we waited.
        match self.state() {
            ModelState::Ready => return Ok(()),
            ModelState::Failed => {
                return Err(anyhow!(
                    "local model previously failed to load, not retrying"
                ))
            }
            _ => {}
        }

        self.set_state(ModelState::Loading);
        info!("loading local model from {}", self.model_dir.display());
        match self.load_engine().await {
            Ok(()) => {
                self.set_state(ModelState::Ready);
                info!("local model ready");
                Ok(())
            }
            Err(e) => {
                self.set_state(ModelState::Failed);
                error!("local model failed to load: {:?}", e);
                Err(e)
            }
        }
    }

    #[cfg(feature = "llm")]
    async fn load_engine(&self) -> Result<()> {
        let model_dir = self.model_dir.clone();
        let engine = tokio::task::block_in_place(|| crate::llm::LocalEngine::load(&model_dir))?;
        *self.engine.lock().await = Some(engine);
        Ok(())
    }

    #[cfg(not(feature = "llm"))]
    async fn load_engine(&self) -> Result<()> {
        Err(anyhow!(
            "local model support not compiled in (build with --features llm)"
        ))
    }

    #[cfg(feature = "llm")]
    async fn run_inference(&self, prompt: &str) -> Result<String> {
        // One inference at a time; the engine holds a kv cache.
        let mut engine = self.engine.lock().await;
        let engine = engine
            .as_mut()
            .ok_or_else(|| anyhow!("local model not loaded"))?;
        tokio::task::block_in_place(|| engine.generate(prompt))
    }

    #[cfg(not(feature = "llm"))]
    async fn run_inference(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!(
            "local model support not compiled in (build with --features llm)"
        ))
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
        self.ensure_loaded().await?;
        self.run_inference(prompt).await
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<TextFragmentStream> {
        // The caller drains streams fully before normalizing, so a single
        // fragment carrying the whole completion satisfies the contract.
        let text = self.generate(prompt, config).await?;
        Ok(Box::pin(tokio_stream::once(Ok(text))))
    }

    fn is_available(&self) -> bool {
        self.state() == ModelState::Ready
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_starts_uninitialized_and_unavailable() {
        let backend = LocalBackend::new(PathBuf::from("models/does-not-exist"));
        assert_eq!(backend.state(), ModelState::Uninitialized);
        assert!(!backend.is_available());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_load_is_terminal() {
        let backend = LocalBackend::new(PathBuf::from("models/does-not-exist"));
        let config = GenerationConfig::new(100, 0.7);

        let first = backend.generate("hello", &config).await;
        assert!(first.is_err());
        assert_eq!(backend.state(), ModelState::Failed);

        // Second call fails fast without retrying the load.
        let second = backend.generate("hello", &config).await;
        assert!(second
            .unwrap_err()
            .to_string()
            .contains("previously failed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_first_use_converges() {
        let backend = std::sync::Arc::new(LocalBackend::new(PathBuf::from(
            "models/does-not-exist",
        )));
        let config = GenerationConfig::new(100, 0.7);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let backend = backend.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                backend.generate("hello", &config).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(backend.state(), ModelState::Failed);
    }
}
