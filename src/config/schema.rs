//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the monitor server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Sampling cadence and retention.
    pub sampling: SamplingConfig,

    /// History query defaults and limits.
    pub history: HistoryConfig,

    /// Live stream settings.
    pub stream: StreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8099").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8099".to_string(),
        }
    }
}

/// Sampling configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Interval between history samples in milliseconds.
    pub interval_ms: u64,

    /// Maximum samples kept (86400 = 24h at one per second).
    pub history_capacity: usize,

    /// Trailing window for request counts in seconds.
    pub request_window_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            history_capacity: 86_400,
            request_window_secs: 10,
        }
    }
}

/// Defaults and limits for `GET /api/metrics/history`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Window used when the query names none, in seconds.
    pub default_window_secs: u64,

    /// Largest window a query may request, in seconds.
    pub max_window_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_window_secs: 600,
            max_window_secs: 86_400,
        }
    }
}

/// Live stream configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Interval between pushed samples when no signal arrives, in milliseconds.
    pub interval_ms: u64,

    /// Pending signals buffered per subscriber before signals are dropped.
    pub subscriber_capacity: usize,

    /// Keep-alive comment interval in seconds.
    pub keep_alive_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            subscriber_capacity: 100,
            keep_alive_secs: 15,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds (not applied to the stream).
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("text" or "json").
    pub log_format: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
