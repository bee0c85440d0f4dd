use std::{env, fs, path::PathBuf, sync::Arc};

use clap::Parser;
use colored::Colorize;
use dirs::home_dir;
use quillgen_server::{
    cli::Cli, config::Settings, AlwaysRemote, BackendPolicy, ContentService, GeminiBackend,
    GenerationConfig, LocalBackend, PreferLocal, Server,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DISPLAY: &str = r"
                _ ____
   ____ ___  __(_/ / /___ ____  ____
  / __ `/ / / / / / / __ `/ _ \/ __ \
 / /_/ / /_/ / / / / /_/ /  __/ / / /
 \__, /\__,_/_/_/_/\__, /\___/_/ /_/
   /_/            /____/
";

fn get_base_dir(custom_path: &Option<String>) -> anyhow::Result<PathBuf> {
    let default_path = home_dir()
        .ok_or_else(|| anyhow::anyhow!("failed to get home directory"))?
        .join(".quillgen");

    let base_dir = custom_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or(default_path);

    fs::create_dir_all(&base_dir)?;
    Ok(base_dir)
}

fn setup_logging(local_data_dir: &PathBuf, cli: &Cli) -> anyhow::Result<WorkerGuard> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("quillgen")
        .filename_suffix("log")
        .max_log_files(5)
        .build(local_data_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("info".parse().unwrap())
        .add_directive("tokenizers=error".parse().unwrap())
        .add_directive("hyper=info".parse().unwrap());

    let env_filter = env::var("QUILLGEN_LOG")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .fold(
            env_filter,
            |filter, module_directive| match module_directive.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(e) => {
                    eprintln!(
                        "warning: invalid log directive '{}': {}",
                        module_directive, e
                    );
                    filter
                }
            },
        );

    let env_filter = if cli.debug {
        env_filter.add_directive("quillgen_server=debug".parse().unwrap())
    } else {
        env_filter
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Misconfiguration is fatal before anything else starts.
    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red(), e);
            std::process::exit(1);
        }
    };

    let local_data_dir = get_base_dir(&cli.data_dir)?;
    let _log_guard = setup_logging(&local_data_dir, &cli)?;

    println!("\n{}", DISPLAY.cyan());
    println!("{}\n", "length-aware ai content generation server".bright_green());

    info!(
        "model: {} | environment: {} | port: {}",
        settings.gemini_model, settings.environment, settings.port
    );
    info!(
        "local model dir: {} (prefer local: {})",
        settings.local_model_dir.display(),
        settings.use_local_model
    );

    let remote = Arc::new(GeminiBackend::new(
        settings.gemini_api_key.clone(),
        settings.gemini_model.clone(),
    ));
    let local = Arc::new(LocalBackend::new(settings.local_model_dir.clone()));
    let policy: Box<dyn BackendPolicy> = if settings.use_local_model {
        Box::new(PreferLocal)
    } else {
        Box::new(AlwaysRemote)
    };
    let generation_config = GenerationConfig::new(settings.max_tokens, settings.temperature);

    let content = ContentService::new(remote, local, policy, generation_config);
    let server = Server::new(content, settings);

    server.start().await
}
