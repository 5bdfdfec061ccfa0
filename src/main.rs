//! Runtime monitor server.
//!
//! # Architecture Overview
//!
//! ```text
//!   request ──▶ tracking middleware ──▶ handler
//!                 │   (route label, heap delta, elapsed)
//!                 ▼
//!   ┌──────────────────────── Monitor ────────────────────────┐
//!   │ RequestWindow   RouteResources   History   Hub          │
//!   └──────▲───────────────────▲──────────▲────────┬──────────┘
//!          │                   │          │        │ signal
//!   RuntimeProbe ◀── Sampler (1s tick) ───┘        ▼
//!   (allocator, tasks, dump → classifier)    SSE consumers
//! ```

use std::path::PathBuf;

use clap::Parser;

use runtime_monitor::config::{load_config, MonitorConfig};
use runtime_monitor::lifecycle::{self, Shutdown};
use runtime_monitor::observability::logging;
use runtime_monitor::runtime::TrackingAllocator;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator;

#[derive(Parser)]
#[command(name = "runtime-monitor")]
#[command(about = "Request-serving demo with an in-process runtime monitor", long_about = None)]
struct Args {
    /// Path to a TOML config file (watched for changes).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MonitorConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "runtime-monitor starting");

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        lifecycle::wait_for_signal().await;
        trigger.trigger();
    });

    lifecycle::start(config, args.config.as_deref(), &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
