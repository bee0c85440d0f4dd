use anyhow::{Context, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::backend::{GenerationBackend, GenerationConfig, TextFragmentStream};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Remote backend speaking the Gemini `generateContent` REST API. Available
/// as soon as it is constructed with a credential; transport and provider
/// errors surface to the caller, which owns any fallback.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    max_output_tokens: usize,
    temperature: f64,
    candidate_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentRequest {
    fn new(prompt: &str, config: &GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: WireGenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
                candidate_count: config.candidate_count,
            },
        }
    }
}

fn extract_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|part| part.text.as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

// Removes one complete line (through `\n`) from the front of the buffer.
// Splitting happens on raw bytes: a newline is never part of a multi-byte
// sequence, so characters that straddle network chunks stay intact and are
// decoded only once the line is whole.
fn drain_line(buffer: &mut Vec<u8>) -> Option<String> {
    let newline = buffer.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=newline).collect();
    Some(
        String::from_utf8_lossy(&line[..newline])
            .trim_end_matches('\r')
            .to_string(),
    )
}

// Gemini streams `data: {json}` lines; the OpenAI-style `[DONE]` sentinel is
// handled for proxies that add it.
fn parse_sse_data_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(chunk) => Some(extract_text(&chunk)),
        Err(e) => {
            debug!("skipping unparseable sse line: {}", e);
            None
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        debug!(
            "sending generation request to {} ({} max tokens)",
            self.model, config.max_output_tokens
        );
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::new(prompt, config))
            .send()
            .await
            .context("failed to reach gemini api")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("gemini api returned {}: {}", status, body);
            anyhow::bail!("gemini api returned {}: {}", status, body);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("failed to parse gemini response")?;
        let text = extract_text(&parsed);
        debug!("gemini returned {} characters", text.len());
        Ok(text)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<TextFragmentStream> {
        debug!("opening streaming generation against {}", self.model);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::new(prompt, config))
            .send()
            .await
            .context("failed to reach gemini api")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("gemini streaming api returned {}: {}", status, body);
            anyhow::bail!("gemini streaming api returned {}: {}", status, body);
        }

        let mut bytes = response.bytes_stream();
        let fragments = stream! {
            // data: lines (and the characters inside them) can split across
            // network chunks, so accumulate raw bytes and only decode
            // completed lines.
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        error!("gemini stream transport error: {:?}", e);
                        yield Err(anyhow::anyhow!("gemini stream transport error: {}", e));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);
                while let Some(line) = drain_line(&mut buffer) {
                    if let Some(text) = parse_sse_data_line(&line) {
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                }
            }
            let tail = String::from_utf8_lossy(&buffer);
            if let Some(text) = parse_sse_data_line(tail.trim_end_matches('\r')) {
                if !text.is_empty() {
                    yield Ok(text);
                }
            }
        };
        Ok(Box::pin(fragments))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let config = GenerationConfig::new(4096, 0.7);
        let request = GenerateContentRequest::new("hello", &config);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4096);
        assert_eq!(value["generationConfig"]["candidateCount"], 1);
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"foo "},{"text":"bar"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(&response), "foo bar");
    }

    #[test]
    fn test_extract_text_tolerates_empty_response() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text(&response), "");
    }

    #[test]
    fn test_drain_line_handles_crlf_and_partial_tail() {
        let mut buffer = b"data: one\r\ndata: two\npartial".to_vec();
        assert_eq!(drain_line(&mut buffer), Some("data: one".to_string()));
        assert_eq!(drain_line(&mut buffer), Some("data: two".to_string()));
        assert_eq!(drain_line(&mut buffer), None);
        assert_eq!(buffer, b"partial");
    }

    #[test]
    fn test_multibyte_character_split_across_chunks_stays_intact() {
        let payload = r#"data: {"candidates":[{"content":{"parts":[{"text":"café au lait"}]}}]}"#;
        let mut wire = payload.as_bytes().to_vec();
        wire.push(b'\n');
        // Cut between the two bytes of the é, as a chunk boundary can.
        let cut = payload.find('é').unwrap() + 1;
        let (first, second) = wire.split_at(cut);

        let mut buffer: Vec<u8> = Vec::new();
        buffer.extend_from_slice(first);
        assert_eq!(drain_line(&mut buffer), None);
        buffer.extend_from_slice(second);
        let line = drain_line(&mut buffer).unwrap();
        assert_eq!(parse_sse_data_line(&line), Some("café au lait".to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_sse_data_line() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"chunk"}]}}]}"#;
        assert_eq!(parse_sse_data_line(line), Some("chunk".to_string()));
        assert_eq!(parse_sse_data_line("data: [DONE]"), None);
        assert_eq!(parse_sse_data_line(""), None);
        assert_eq!(parse_sse_data_line(": keepalive comment"), None);
        assert_eq!(parse_sse_data_line("data: not json"), None);
    }
}
