mod cli;
mod commands;
mod error;
mod metadata;
mod output;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use ferroquote_core::{ServiceConfig, StockDataService};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            tracing::debug!(code = error.exit_code(), "command failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout = Duration::from_millis(timeout_ms);
    }
    tracing::debug!(mode = %config.mode, timeout_ms = config.request_timeout.as_millis() as u64, "configuration loaded");

    let service = StockDataService::new(config);
    let envelope = commands::run(&cli, &service).await?;
    output::render(&envelope, cli.pretty)?;

    Ok(ExitCode::from(envelope.exit_code()))
}

/// Logs go to stderr so stdout stays pure JSON.
fn init_tracing() {
    let filter = std::env::var("FERROQUOTE_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
