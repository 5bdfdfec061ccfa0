//! Per-route statistics.
//!
//! Resource figures are estimates: the lifetime average per request times the
//! number of requests in the current window.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::runtime::BlockCounts;
use crate::tracker::resources::RouteResources;
use crate::tracker::window::GLOBAL_ROUTE;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Statistics for one route, built fresh for every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStat {
    pub route: String,
    /// Requests in the trailing request window.
    pub requests: usize,
    /// Estimated memory for the window, in MB.
    pub memory_usage: f64,
    /// Estimated processing time for the window, in milliseconds.
    pub cpu_usage: f64,
    pub block_lock: usize,
    #[serde(rename = "blockIO")]
    pub block_io: usize,
    pub block_perm: usize,
}

/// Combine window counts, blocking counts and resource averages.
///
/// Every route seen by either the window counts or the classifier gets one
/// entry, except the global sequence. Order is unspecified.
pub fn aggregate(
    window_counts: &HashMap<String, usize>,
    blocks: &HashMap<String, BlockCounts>,
    resources: &RouteResources,
) -> Vec<RouteStat> {
    let routes: HashSet<&String> = window_counts
        .keys()
        .chain(blocks.keys())
        .filter(|route| route.as_str() != GLOBAL_ROUTE)
        .collect();

    routes
        .into_iter()
        .map(|route| {
            let requests = window_counts.get(route).copied().unwrap_or(0);
            let block = blocks.get(route).copied().unwrap_or_default();
            let average = resources.average_per_request(route);

            let (memory_usage, cpu_usage) = if requests > 0 {
                (
                    average.bytes / BYTES_PER_MB * requests as f64,
                    average.cpu.as_secs_f64() * 1000.0 * requests as f64,
                )
            } else {
                (0.0, 0.0)
            };

            RouteStat {
                route: route.clone(),
                requests,
                memory_usage,
                cpu_usage,
                block_lock: block.lock,
                block_io: block.io,
                block_perm: block.long_blocked,
            }
        })
        .collect()
}
