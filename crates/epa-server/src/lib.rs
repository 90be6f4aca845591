//! Server wiring for the employee performance store.
//!
//! Mounts the JSON API under `/api` and wraps it in request tracing. The
//! binary in `main.rs` handles configuration and the store lifecycle.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use epa_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `EPA_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8380 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/epa/performance.db") }

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router over an open store.
pub fn app(store: SqliteStore) -> Router {
  Router::new()
    .nest("/api", epa_api::api_router(Arc::new(store)))
    .layer(TraceLayer::new_for_http())
}
