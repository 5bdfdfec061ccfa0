//! Per-route resource accumulation.
//!
//! Totals only grow for the lifetime of the process, so the averages are
//! lifetime averages rather than windowed ones.

use std::time::Duration;

use dashmap::DashMap;

#[derive(Debug, Default, Clone, Copy)]
struct RouteTotals {
    memory_bytes: u64,
    cpu: Duration,
    requests: u64,
}

/// Average resource cost of one request on a route.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ResourceAverage {
    pub bytes: f64,
    pub cpu: Duration,
}

/// Running memory and CPU totals per route.
#[derive(Debug, Default)]
pub struct RouteResources {
    totals: DashMap<String, RouteTotals>,
}

impl RouteResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add heap growth attributed to one request. Does not count the request.
    pub fn add_memory_delta(&self, route: &str, bytes: u64) {
        let mut totals = self.totals.entry(route.to_string()).or_default();
        totals.memory_bytes = totals.memory_bytes.saturating_add(bytes);
    }

    /// Add the processing time of one completed request and count it.
    pub fn add_cpu_time(&self, route: &str, cpu: Duration) {
        let mut totals = self.totals.entry(route.to_string()).or_default();
        totals.cpu = totals.cpu.saturating_add(cpu);
        totals.requests += 1;
    }

    /// Lifetime average per request; zero when nothing was counted.
    pub fn average_per_request(&self, route: &str) -> ResourceAverage {
        let Some(totals) = self.totals.get(route).map(|t| *t) else {
            return ResourceAverage::default();
        };
        if totals.requests == 0 {
            return ResourceAverage::default();
        }
        let divisor = u32::try_from(totals.requests).unwrap_or(u32::MAX);
        ResourceAverage {
            bytes: totals.memory_bytes as f64 / totals.requests as f64,
            cpu: totals.cpu / divisor,
        }
    }

    /// Completed requests counted for `route`.
    pub fn request_count(&self, route: &str) -> u64 {
        self.totals.get(route).map(|t| t.requests).unwrap_or(0)
    }
}
