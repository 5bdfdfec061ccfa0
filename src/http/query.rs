//! Query parameter parsing.
//!
//! Bad input never fails a request: unparsable or non-positive values fall
//! back to defaults.

use serde::Deserialize;

/// Parse a positive integer, or fall back to `default`.
pub fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

/// Window selection for history queries, raw from the query string.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub window: Option<String>,
    pub minutes: Option<String>,
    pub hours: Option<String>,
}

impl WindowQuery {
    /// Effective window in seconds.
    ///
    /// Precedence is `window` > `minutes` > `hours`; the first valid one wins
    /// and is clamped to `max_secs`. With none valid, `default_secs`.
    pub fn resolve(&self, max_secs: u64, default_secs: u64) -> u64 {
        let candidates = [
            (self.window.as_deref(), 1u64),
            (self.minutes.as_deref(), 60),
            (self.hours.as_deref(), 3600),
        ];
        candidates
            .into_iter()
            .find_map(|(raw, unit)| {
                let value = raw?.trim().parse::<u64>().ok().filter(|&v| v > 0)?;
                Some(value.saturating_mul(unit).min(max_secs))
            })
            .unwrap_or(default_secs)
    }
}

/// Demo endpoint parameters.
#[derive(Debug, Default, Deserialize)]
pub struct DemoQuery {
    pub ms: Option<String>,
    pub n: Option<String>,
}
