//! epa-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens and
//! upgrades the SQLite store, and serves the JSON API under `/api`.
//!
//! ```
//! cargo run -p epa-server --bin server -- --config config.toml
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use epa_server::{ServerConfig, expand_tilde};
use epa_store_sqlite::{StoreManager, StoreOptions};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Employee performance store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Upgrade the store to the latest schema, print its version and exit.
  #[arg(long)]
  migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("EPA"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  // Open (and upgrade) the SQLite store.
  let manager = StoreManager::new(&store_path, StoreOptions::default());
  let store = manager
    .open()
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if cli.migrate_only {
    let version = store
      .schema_version()
      .await
      .context("failed to read schema version")?;
    println!("{version}");
    manager.close().await.context("failed to close store")?;
    return Ok(());
  }

  let app = epa_server::app(store);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  manager.close().await.context("failed to close store")?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
