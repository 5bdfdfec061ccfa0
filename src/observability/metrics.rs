//! Prometheus metrics exposition.
//!
//! # Metrics
//! - `runtime_tasks` (gauge): scheduled tasks at the last sample
//! - `runtime_window_requests` (gauge): requests in the trailing window
//! - `runtime_heap_*` (gauges): heap figures from the last sample
//! - `runtime_reclaims_total` (gauge): cumulative reclamations
//! - `runtime_blocked_tasks{kind}` (gauge): lock / io / long blocked tasks
//! - `http_requests_total{route,status}` (counter)
//! - `http_request_duration_seconds{route}` (histogram)
//! - `stream_subscribers` (gauge): open metric streams

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::tracker::Sample;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Mirror a sample into gauges.
pub fn record_sample(sample: &Sample) {
    gauge!("runtime_tasks").set(sample.tasks as f64);
    gauge!("runtime_window_requests").set(sample.requests as f64);
    gauge!("runtime_heap_alloc_bytes").set(sample.heap_alloc as f64);
    gauge!("runtime_heap_inuse_bytes").set(sample.heap_inuse as f64);
    gauge!("runtime_heap_sys_bytes").set(sample.heap_sys as f64);
    gauge!("runtime_heap_objects").set(sample.heap_objects as f64);
    gauge!("runtime_reclaims_total").set(f64::from(sample.num_gc));
    gauge!("runtime_blocked_tasks", "kind" => "lock").set(sample.block_lock as f64);
    gauge!("runtime_blocked_tasks", "kind" => "io").set(sample.block_io as f64);
    gauge!("runtime_blocked_tasks", "kind" => "long").set(sample.block_perm as f64);
}

/// Record one completed HTTP request.
pub fn record_request(route: &str, status: u16, elapsed: Duration) {
    counter!(
        "http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}

/// Update the open stream count.
pub fn record_subscribers(count: usize) {
    gauge!("stream_subscribers").set(count as f64);
}
