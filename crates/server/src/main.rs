//! Top Movies API server.
//!
//! Serves the JSON API over an in-memory store, optionally restored from and
//! saved back to a snapshot file.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ranking::InMemoryStore;
use server::{ServerConfig, TopMoviesService, router};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!("Starting Top Movies server");

    let store = match &config.snapshot {
        Some(path) => Arc::new(
            InMemoryStore::load_from_file(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?,
        ),
        None => {
            warn!("No snapshot configured, lists will be lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };
    let (lists, entries) = store.counts();
    info!(lists, entries, "Store ready");

    let service = TopMoviesService::new(store.clone(), config.lock_timeout());
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}/api/v1/", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(path) = &config.snapshot {
        store
            .save_to_file(path)
            .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, keep serving until the process is killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
