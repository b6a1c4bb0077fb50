//! consign server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and serves the JSON API over HTTP. Ctrl-C stops the listener and
//! any poll cycle in progress at its next batch boundary.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use consign_server::{ServerConfig, build_engine, expand_tilde, poll_once, router};
use consign_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Carrier tracking synchronization server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Poll every carrier once right after startup.
  #[arg(long)]
  poll_on_start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let engine = Arc::new(build_engine(&server_cfg, Arc::new(store), shutdown_rx.clone()));

  if cli.poll_on_start {
    let engine = engine.clone();
    tokio::spawn(async move { poll_once(&engine).await });
  }

  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
      }
      Err(e) => {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        // keep the sender alive so the server is not shut down
        std::future::pending::<()>().await;
        drop(shutdown_tx);
      }
    }
  });

  let app = router(engine);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let mut shutdown = shutdown_rx;
  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      let _ = shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .context("server error")?;

  Ok(())
}
