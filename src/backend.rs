use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Incremental text fragments from a streaming-capable backend.
pub type TextFragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Generation parameters passed to a backend on every call.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_output_tokens: usize,
    /// Sampling temperature, valid range 0.0..=2.0.
    pub temperature: f64,
    /// Always 1; the pipeline consumes a single candidate.
    pub candidate_count: usize,
}

impl GenerationConfig {
    pub fn new(max_output_tokens: usize, temperature: f64) -> Self {
        Self {
            max_output_tokens,
            temperature,
            candidate_count: 1,
        }
    }

    /// Derives the streaming variant of this config: token budget capped so a
    /// stream cannot run long past what the client will display.
    pub fn for_streaming(&self) -> Self {
        Self {
            max_output_tokens: self.max_output_tokens.min(800),
            ..self.clone()
        }
    }
}

/// A generation provider. Implementations must be safe to call from
/// concurrent requests; anything that cannot serve concurrent inferences has
/// to serialize internally.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Single-shot generation returning the complete raw text.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Incremental generation. The returned stream is finite and
    /// non-restartable; errors mid-stream terminate it.
    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<TextFragmentStream>;

    /// Whether this backend can currently serve requests.
    fn is_available(&self) -> bool;

    fn name(&self) -> &str;
}

/// Decides per-prompt whether generation should prefer the local model over
/// the remote provider. Injected into the orchestrator so the decision is
/// swappable without touching it.
pub trait BackendPolicy: Send + Sync {
    fn prefer_local(&self, prompt: &str) -> bool;
}

/// Default policy: every prompt goes to the remote provider.
pub struct AlwaysRemote;

impl BackendPolicy for AlwaysRemote {
    fn prefer_local(&self, _prompt: &str) -> bool {
        false
    }
}

/// Developer-override policy enabled by `--use-local-model`. Local failures
/// still fall back to the remote provider.
pub struct PreferLocal;

impl BackendPolicy for PreferLocal {
    fn prefer_local(&self, _prompt: &str) -> bool {
        true
    }
}
