//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request id, tracing, timeouts, route attribution)
//! - Start the sampler and apply configuration reloads
//! - Bind server to listener and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{body::Body, http::Request, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::MonitorConfig;
use crate::http::handlers;
use crate::http::middleware::tracking_middleware;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::runtime::{ProcessProbe, TaskRegistry};
use crate::sampling::Sampler;
use crate::tracker::{Monitor, MonitorSettings};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub tasks: Arc<TaskRegistry>,
    pub config: Arc<ArcSwap<MonitorConfig>>,
    /// Flips to true when the server starts shutting down.
    pub closed: watch::Receiver<bool>,
    /// Lock contended by the demo `/api/contend` endpoint.
    pub contention: Arc<Mutex<()>>,
}

/// HTTP server exposing the monitor.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: MonitorConfig,
    closed_tx: watch::Sender<bool>,
}

impl HttpServer {
    /// Create a server with a process-backed monitor.
    pub fn new(config: MonitorConfig) -> Self {
        let tasks = Arc::new(TaskRegistry::new());
        let probe = Arc::new(ProcessProbe::new(tasks.clone()));
        let monitor = Arc::new(Monitor::new(MonitorSettings::from(&config), probe));
        Self::with_monitor(config, monitor, tasks)
    }

    /// Create a server around an existing monitor and task registry.
    pub fn with_monitor(
        config: MonitorConfig,
        monitor: Arc<Monitor>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        let state = AppState {
            monitor,
            tasks,
            config: Arc::new(ArcSwap::from_pointee(config.clone())),
            closed: closed_rx,
            contention: Arc::new(Mutex::new(())),
        };
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
            closed_tx,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &MonitorConfig, state: AppState) -> Router {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);

        Router::new()
            .route("/api/ping", get(handlers::ping))
            .route("/api/ping/slow", get(handlers::ping_slow))
            .route("/api/busy", get(handlers::busy))
            .route("/api/contend", get(handlers::contend))
            .route("/api/metrics", get(handlers::metrics))
            .route("/api/metrics/history", get(handlers::metrics_history))
            .route("/api/metrics/routes", get(handlers::metrics_routes))
            // Applies to the routes above only; the stream is long-lived.
            .layer(TimeoutLayer::new(request_timeout))
            .route("/api/metrics/stream", get(handlers::metrics_stream))
            .route_layer(middleware::from_fn_with_state(state.clone(), tracking_middleware))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Router with all routes and layers, for embedding or testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        self.state.monitor.clone()
    }

    pub fn tasks(&self) -> Arc<TaskRegistry> {
        self.state.tasks.clone()
    }

    /// Get a reference to the startup config.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<MonitorConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sampler = Sampler::new(
            self.state.monitor.clone(),
            Duration::from_millis(self.config.sampling.interval_ms),
        );
        tokio::spawn(sampler.run(shutdown.resubscribe()));

        let live_config = self.state.config.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => {
                            apply_config_update(&live_config, new_config);
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let closed_tx = self.closed_tx;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, closing streams");
                let _ = closed_tx.send(true);
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Swap in a reloaded config.
///
/// Only the history section is copied into the live config; every other
/// section keeps its startup value. Returns true when other sections
/// changed and a restart is needed to apply them.
pub fn apply_config_update(live: &ArcSwap<MonitorConfig>, new_config: MonitorConfig) -> bool {
    let current = live.load_full();
    let restart_needed = current.listener != new_config.listener
        || current.sampling != new_config.sampling
        || current.stream != new_config.stream
        || current.timeouts != new_config.timeouts
        || current.observability != new_config.observability;

    if restart_needed {
        tracing::warn!("Config changes outside [history] take effect after a restart");
    }
    tracing::info!(
        default_window_secs = new_config.history.default_window_secs,
        max_window_secs = new_config.history.max_window_secs,
        "Configuration reloaded"
    );
    let mut applied = (*current).clone();
    applied.history = new_config.history;
    live.store(Arc::new(applied));
    restart_needed
}
