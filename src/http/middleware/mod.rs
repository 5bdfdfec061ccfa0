//! HTTP middleware.

pub mod tracking;

pub use tracking::tracking_middleware;
