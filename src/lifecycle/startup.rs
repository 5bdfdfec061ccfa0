//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start the config watcher when a config file is in use
//! - Bind the listener last, so traffic only arrives when ready

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{ConfigWatcher, MonitorConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the monitor server until `shutdown` fires.
///
/// When `config_path` is given the file is watched and reloads are applied.
pub async fn start(
    config: MonitorConfig,
    config_path: Option<&Path>,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    let shutdown_rx = shutdown.subscribe();

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must stay alive for the whole run.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(
        address = %config.listener.bind_address,
        sampling_interval_ms = config.sampling.interval_ms,
        history_capacity = config.sampling.history_capacity,
        "Listening for connections"
    );

    let server = HttpServer::new(config);
    server
        .run(listener, config_updates, shutdown_rx)
        .await
        .map_err(StartupError::Serve)
}
