//! In-process runtime monitor for request-serving applications.
//!
//! Samples process metrics, attributes request volume, resource cost and
//! blocking to routes, keeps a bounded history and streams live updates.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod runtime;
pub mod sampling;
pub mod stream;
pub mod tracker;

pub use config::MonitorConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use tracker::{Monitor, RouteStat, Sample};
