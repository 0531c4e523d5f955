mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod forms;
mod query;
mod routes;
mod session;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::cache::{NoopStorage, SqliteStorage};

#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(about = "A terminal client for a task & team management service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/taskdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overriding the config file
  #[arg(short, long)]
  base_url: Option<String>,

  /// Skip the on-disk cache for this run
  #[arg(long)]
  no_cache: bool,
}

/// Logs go to a rolling file; the terminal belongs to the UI.
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory for logs"))?
    .join("taskdeck")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(log_dir, "taskdeck.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskdeck=info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override the backend URL if specified on the command line
  let config = if let Some(base_url) = args.base_url {
    config::Config {
      api: config::ApiConfig { base_url },
      ..config
    }
  } else {
    config
  };

  // Initialize and run the app; the storage backend is picked once here
  if config.cache.enabled && !args.no_cache {
    let storage = SqliteStorage::open()?;
    app::App::new(config, storage).await?.run().await
  } else {
    app::App::new(config, NoopStorage).await?.run().await
  }
}
