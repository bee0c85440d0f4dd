use clap::Parser;

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    long_about = None,
    name = "quillgen"
)]
pub struct Cli {
    /// Gemini API key for remote generation. Required; startup fails without it.
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// Gemini model identifier
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash-exp")]
    pub gemini_model: String,

    /// Default maximum output tokens per generation
    #[arg(long, env = "MAX_TOKENS", default_value_t = 4096)]
    pub max_tokens: usize,

    /// Sampling temperature, must be between 0.0 and 2.0
    #[arg(long, env = "TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f64,

    /// Comma-separated list of origins allowed to call the API
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    pub cors_origins: String,

    /// Deployment environment label, echoed by the health endpoint
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Port to run the server on
    #[arg(short = 'p', long, env = "QUILLGEN_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Data directory. Default to $HOME/.quillgen
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Directory holding the local model artifact (requires the llm feature)
    #[arg(
        long,
        env = "LOCAL_MODEL_DIR",
        default_value = "models/content-generator-20k"
    )]
    pub local_model_dir: String,

    /// Prefer the locally hosted model over the remote provider.
    /// Local failures still fall back to the remote provider.
    #[arg(long, default_value_t = false)]
    pub use_local_model: bool,

    /// Enable debug logging for quillgen modules
    #[arg(long)]
    pub debug: bool,
}
