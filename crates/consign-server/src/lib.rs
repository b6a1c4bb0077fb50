//! Wiring for the consign server binary: configuration, engine construction
//! and the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use consign_api::Engine;
use consign_carriers::{FormCarrierConfig, JsonProxyCarrier, JsonProxyConfig, TableCarrier};
use consign_core::{carrier::Carrier, store::ConsignmentStore};
use consign_sync::SyncEngine;
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Environment variables override the file, e.g.
/// `CONSIGN__TPC__BATCH_CAP=50`.
pub const ENV_PREFIX: &str = "CONSIGN";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path: PathBuf,
  pub tpc:        FormCarrierConfig,
  pub franch:     JsonProxyConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8080,
      store_path: PathBuf::from("consign.db"),
      tpc:        FormCarrierConfig::default(),
      franch:     JsonProxyConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Load from the TOML file at `path` (optional) layered under
  /// `CONSIGN__*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::from_source(config::File::from(path).required(false))
  }

  fn from_source<T>(file: T) -> Result<Self, config::ConfigError>
  where
    T: config::Source + Send + Sync + 'static,
  {
    config::Config::builder()
      .add_source(file)
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

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

// ─── Engine and router ────────────────────────────────────────────────────────

/// Engine over `store` with the live carrier adapters from `config`.
pub fn build_engine<S: ConsignmentStore>(
  config: &ServerConfig,
  store: Arc<S>,
  shutdown: watch::Receiver<bool>,
) -> SyncEngine<S> {
  SyncEngine::new(
    store,
    TableCarrier::new(config.tpc.clone()),
    JsonProxyCarrier::new(config.franch.clone()),
  )
  .with_shutdown(shutdown)
}

/// The API nested under `/api`, with request tracing.
pub fn router<S>(engine: Arc<Engine<S>>) -> Router
where
  S: ConsignmentStore + 'static,
{
  Router::new()
    .nest("/api", consign_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

/// Poll every carrier once and log the outcome.
pub async fn poll_once<S>(engine: &Engine<S>)
where
  S: ConsignmentStore + 'static,
{
  for (carrier, result) in Carrier::ALL.into_iter().zip(engine.poll_all().await) {
    match result {
      Ok(report) => info!(
        %carrier,
        updated = report.updated,
        inserted = report.inserted,
        failed = report.failed_batches(),
        "startup poll finished"
      ),
      Err(e) => warn!(%carrier, error = %e, "startup poll failed"),
    }
  }
}
