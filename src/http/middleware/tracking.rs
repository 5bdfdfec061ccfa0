//! Per-request attribution middleware.
//!
//! Installed as a route layer so the matched route pattern is available.
//! For each request it:
//! 1. records the arrival on the route and wakes stream subscribers
//! 2. runs the handler as a tracked task labelled with the route
//! 3. attributes heap growth and elapsed time to the route

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::observability::metrics;

/// Route identifier: the matched pattern, else the raw path.
pub fn route_of<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

pub async fn tracking_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = route_of(&request);
    let monitor = &state.monitor;

    let started = Instant::now();
    let heap_before = monitor.probe().memory().heap_alloc;
    monitor.record_request(&route);

    let label: Arc<str> = Arc::from(route.as_str());
    let response = state.tasks.scope(Some(label), next.run(request)).await;

    let elapsed = started.elapsed();
    let heap_after = monitor.probe().memory().heap_alloc;
    monitor.record_completion(&route, heap_after.saturating_sub(heap_before), elapsed);
    metrics::record_request(&route, response.status().as_u16(), elapsed);

    tracing::debug!(
        route = %route,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Request tracked"
    );
    response
}
