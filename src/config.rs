use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::cli::Cli;

/// Process-wide settings resolved once at startup. Construction validates the
/// hard requirements so a misconfigured process dies at startup instead of at
/// request time.
#[derive(Clone, Debug)]
pub struct Settings {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub max_tokens: usize,
    pub temperature: f64,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub port: u16,
    pub local_model_dir: PathBuf,
    pub use_local_model: bool,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let gemini_api_key = cli
            .gemini_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("GEMINI_API_KEY is required (set the env var or pass --gemini-api-key)")?;

        if !(0.0..=2.0).contains(&cli.temperature) {
            bail!(
                "temperature must be between 0.0 and 2.0, got {}",
                cli.temperature
            );
        }

        Ok(Self {
            gemini_api_key,
            gemini_model: cli.gemini_model.clone(),
            max_tokens: cli.max_tokens,
            temperature: cli.temperature,
            cors_origins: parse_origins(&cli.cors_origins),
            environment: cli.environment.clone(),
            port: cli.port,
            local_model_dir: PathBuf::from(&cli.local_model_dir),
            use_local_model: cli.use_local_model,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
