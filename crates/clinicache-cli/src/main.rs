//! Clinicache - offline-first hospital doctors and appointments from the command line.
//!
//! Manages the local doctor/appointment store, the versioned offline cache of
//! the web client's app shell, user preferences and openFDA drug lookups.

mod app;
mod cli;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clinicache_core::config::Config;

use app::{App, AppPaths};
use cli::Cli;

/// Set to a file path to also write logs there.
const LOG_FILE_ENV: &str = "CLINICACHE_LOG_FILE";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            let path = Path::new(&path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().unwrap_or(path.as_os_str());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let cli = Cli::parse();

    let config = Config::load().context("Failed to load config")?;
    let paths = AppPaths::from_config(&config)?;
    info!(origin = %config.origin, version = %config.cache_version, "Clinicache starting");

    let app = App::new(config, paths, cli.json)?;
    app.run(cli.command).await
}
