//! Request handlers.
//!
//! Metrics endpoints expose the tracker; the demo endpoints generate load
//! with recognisable wait states.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::http::query::{positive_or, DemoQuery, WindowQuery};
use crate::http::server::AppState;
use crate::runtime::{wait_on, TaskState};
use crate::stream::sample_events;

/// Upper bound on tasks one `/api/busy` call may spawn.
pub const MAX_BUSY_TASKS: u64 = 10_000;

pub async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}

pub async fn ping_slow(Query(query): Query<DemoQuery>) -> impl IntoResponse {
    let ms = positive_or(query.ms.as_deref(), 2000);
    wait_on(TaskState::Sleep, tokio::time::sleep(Duration::from_millis(ms))).await;
    Json(json!({ "message": "pong", "sleep_ms": ms }))
}

pub async fn busy(
    State(state): State<AppState>,
    Query(query): Query<DemoQuery>,
) -> impl IntoResponse {
    let n = positive_or(query.n.as_deref(), 50).min(MAX_BUSY_TASKS);
    let ms = positive_or(query.ms.as_deref(), 2000);
    let pause = Duration::from_millis(ms);

    for _ in 0..n {
        state.tasks.spawn_labeled(async move {
            wait_on(TaskState::Sleep, tokio::time::sleep(pause)).await;
        });
    }
    tracing::debug!(spawned = n, sleep_ms = ms, "Spawned busy tasks");
    Json(json!({ "spawned": n, "sleep_ms": ms }))
}

/// Serialise callers on a shared lock held for `ms`.
pub async fn contend(
    State(state): State<AppState>,
    Query(query): Query<DemoQuery>,
) -> impl IntoResponse {
    let ms = positive_or(query.ms.as_deref(), 500);
    let guard = wait_on(TaskState::Semacquire, state.contention.lock()).await;
    wait_on(TaskState::Sleep, tokio::time::sleep(Duration::from_millis(ms))).await;
    drop(guard);
    Json(json!({ "held_ms": ms }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.current_sample())
}

pub async fn metrics_history(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> impl IntoResponse {
    let config = state.config.load_full();
    let secs = query.resolve(
        config.history.max_window_secs,
        config.history.default_window_secs,
    );
    let seconds = i64::try_from(secs).unwrap_or(i64::MAX);
    Json(state.monitor.history().window(seconds))
}

pub async fn metrics_routes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.route_stats())
}

pub async fn metrics_stream(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.load_full();
    let events = sample_events(
        state.monitor.clone(),
        Duration::from_millis(config.stream.interval_ms),
        state.closed.clone(),
    );
    Sse::new(events).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(config.stream.keep_alive_secs)),
    )
}
