//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Check that history defaults fit inside their limits
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MonitorConfig;

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("history.default_window_secs ({default}) exceeds history.max_window_secs ({max})")]
    DefaultWindowTooLarge { default: u64, max: u64 },

    #[error("observability.log_format must be \"text\" or \"json\", got {0:?}")]
    LogFormat(String),
}

/// Check every semantic rule, collecting all failures.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let positive: [(&'static str, u64); 8] = [
        ("sampling.interval_ms", config.sampling.interval_ms),
        ("sampling.history_capacity", config.sampling.history_capacity as u64),
        ("sampling.request_window_secs", config.sampling.request_window_secs),
        ("history.default_window_secs", config.history.default_window_secs),
        ("history.max_window_secs", config.history.max_window_secs),
        ("stream.interval_ms", config.stream.interval_ms),
        ("stream.subscriber_capacity", config.stream.subscriber_capacity as u64),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.history.default_window_secs > config.history.max_window_secs {
        errors.push(ValidationError::DefaultWindowTooLarge {
            default: config.history.default_window_secs,
            max: config.history.max_window_secs,
        });
    }

    if !matches!(config.observability.log_format.as_str(), "text" | "json") {
        errors.push(ValidationError::LogFormat(config.observability.log_format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
