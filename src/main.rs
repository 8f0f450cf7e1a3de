use std::sync::Arc;
use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use smolchat::chat;
use smolchat::cli::{Cli, Command};
use smolchat::config::{LoggingConfig, Settings};
use smolchat::llm::{load_model, ChatService, LlamaGenerator};
use smolchat::server::ApiServer;

/// Main entry point for SmolChat
///
/// Loads settings, brings the model up once and then either serves the web
/// chat page, serves it alongside a terminal chat, or answers one prompt.
/// A model that fails to load ends the process with a non-zero status.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Serve);

    let settings = Settings::load(&cli.config_dir, &cli.overrides())
        .with_context(|| format!("Failed to load settings from {}", cli.config_dir.display()))?;

    let quiet = !matches!(command, Command::Serve);
    let _guard = init_logging(&settings.logging, quiet)?;

    info!("SmolChat v{} starting up...", env!("CARGO_PKG_VERSION"));
    if let Some(dir) = &settings.logging.directory {
        info!("Log directory: {}", dir.display());
    }
    info!("Settings loaded");

    let loaded = match load_model(&settings).await {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load model: {}", e);
            return Err(anyhow!("Failed to load model: {}", e));
        }
    };

    info!(
        "Model: {} | Device: {} | Backend: {}",
        loaded.info.model_id, loaded.info.device, loaded.info.backend
    );

    let generator = LlamaGenerator::new(loaded.model, &settings.inference);
    let defaults = settings.generation.to_params();
    let service = Arc::new(ChatService::new(
        Arc::new(generator),
        loaded.info,
        defaults,
        settings.inference.max_concurrent,
    ));

    match command {
        Command::Serve => {
            let server = ApiServer::new(service, settings.server.host.clone(), settings.server.port);
            server.start().await.map_err(|e| anyhow!(e))?;
        }
        Command::Run => {
            let server = ApiServer::new(service, settings.server.host.clone(), settings.server.port);
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Server error: {}", e);
                }
            });

            // Give the server a moment to bind
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            let host = match settings.server.host.as_str() {
                "0.0.0.0" => "127.0.0.1",
                host => host,
            };
            let url = format!("http://{}:{}", host, settings.server.port);
            chat::chat_loop(&url, defaults).await.map_err(|e| anyhow!(e))?;
        }
        Command::Ask { ref prompt, .. } => {
            let params = command.ask_params(defaults).unwrap_or(defaults);
            let reply = service.chat(prompt, params).await;
            println!("{}", reply);
        }
    }

    Ok(())
}

/// Console output always goes to stderr; `quiet` keeps it to warnings so
/// terminal modes stay readable. A daily JSON log file is added when a log
/// directory is configured.
fn init_logging(config: &LoggingConfig, quiet: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let console_level = if quiet { LevelFilter::WARN } else { LevelFilter::TRACE };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level);

    let (file, guard) = match &config.directory {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "smolchat");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
