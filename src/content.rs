use anyhow::Result;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::backend::{BackendPolicy, GenerationBackend, GenerationConfig};
use crate::length::{parse_length_requirement, rewrite_prompt};
use crate::normalize::normalize_output;

/// Fallback text when a backend returns an empty completion.
const EMPTY_COMPLETION_FALLBACK: &str = "Generated content successfully!";

/// Character-wise re-emission of a normalized completion. Never yields an
/// error; failures become a terminal fragment.
pub type CharacterStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Orchestrates one generation request: parse the length requirement, rewrite
/// the prompt, pick a backend through the injected policy, generate, then
/// normalize. Pure glue around stateless pieces; safe to share across
/// requests.
pub struct ContentService {
    remote: Arc<dyn GenerationBackend>,
    local: Arc<dyn GenerationBackend>,
    policy: Box<dyn BackendPolicy>,
    config: GenerationConfig,
}

impl ContentService {
    pub fn new(
        remote: Arc<dyn GenerationBackend>,
        local: Arc<dyn GenerationBackend>,
        policy: Box<dyn BackendPolicy>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            remote,
            local,
            policy,
            config,
        }
    }

    /// Batch generation that never fails the request: any error is converted
    /// into a user-facing apology string.
    pub async fn generate_once(&self, prompt: &str) -> String {
        match self.try_generate(prompt).await {
            Ok(content) => content,
            Err(e) => {
                error!("content generation failed: {:?}", e);
                format!("Sorry, I encountered an error: {}", e)
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<String> {
        let requirement = parse_length_requirement(prompt);
        debug!("parsed length requirement: {:?}", requirement);
        let rewritten = rewrite_prompt(prompt, &requirement);

        let raw = self.generate_raw(prompt, &rewritten).await?;
        let raw = if raw.trim().is_empty() {
            EMPTY_COMPLETION_FALLBACK.to_string()
        } else {
            raw
        };
        Ok(normalize_output(&raw, &requirement))
    }

    /// Runs batch generation against the policy-preferred backend. A local
    /// failure is logged and swallowed; the remote backend is the fallback.
    async fn generate_raw(&self, original: &str, rewritten: &str) -> Result<String> {
        if self.policy.prefer_local(original) {
            match self.local.generate(rewritten, &self.config).await {
                Ok(text) => {
                    info!("{} backend served the request", self.local.name());
                    return Ok(text);
                }
                Err(e) => {
                    error!(
                        "{} backend failed, falling back to {}: {:?}",
                        self.local.name(),
                        self.remote.name(),
                        e
                    );
                }
            }
        }
        self.remote.generate(rewritten, &self.config).await
    }

    /// Streaming generation. The backend stream is drained fully before
    /// normalization (truncation needs the complete text), then the
    /// normalized result is re-emitted one character per fragment. A failure
    /// anywhere becomes a single terminal error fragment; the stream itself
    /// never errors.
    pub fn generate_stream(&self, prompt: &str) -> CharacterStream {
        let requirement = parse_length_requirement(prompt);
        debug!("parsed length requirement: {:?}", requirement);
        let rewritten = rewrite_prompt(prompt, &requirement);
        let config = self.config.for_streaming();
        let prefer_local = self.policy.prefer_local(prompt);
        let remote = Arc::clone(&self.remote);
        let local = Arc::clone(&self.local);

        Box::pin(stream! {
            let drained = if prefer_local {
                match drain_backend_stream(local.as_ref(), &rewritten, &config).await {
                    Ok(text) => Ok(text),
                    Err(e) => {
                        error!(
                            "{} backend failed, falling back to {}: {:?}",
                            local.name(),
                            remote.name(),
                            e
                        );
                        drain_backend_stream(remote.as_ref(), &rewritten, &config).await
                    }
                }
            } else {
                drain_backend_stream(remote.as_ref(), &rewritten, &config).await
            };

            match drained {
                Ok(full) => {
                    let normalized = normalize_output(&full, &requirement);
                    for ch in normalized.chars() {
                        yield ch.to_string();
                    }
                }
                Err(e) => {
                    error!("streaming generation failed: {:?}", e);
                    yield format!("Error: {}", e);
                }
            }
        })
    }
}

/// Collects every fragment of a backend stream into one string. A transport
/// or provider error part-way through discards the partial text and surfaces
/// the error.
async fn drain_backend_stream(
    backend: &dyn GenerationBackend,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String> {
    let mut fragments = backend.generate_stream(prompt, config).await?;
    let mut full = String::new();
    while let Some(fragment) = fragments.next().await {
        full.push_str(&fragment?);
    }
    Ok(full)
}
