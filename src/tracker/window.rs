//! Sliding-window request counting.
//!
//! Arrivals are appended per route under one lock and never go backwards,
//! so every sequence is in time order. Counting a window drops the stale prefix of the sequences it
//! touches; there is no other eviction.

use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::Duration;

use crate::tracker::now_millis;

/// Key of the sequence that receives every arrival.
pub const GLOBAL_ROUTE: &str = "";

/// Per-route arrival timestamps (milliseconds since epoch).
#[derive(Debug, Default)]
pub struct RequestWindow {
    arrivals: RwLock<HashMap<String, VecDeque<i64>>>,
}

impl RequestWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, VecDeque<i64>>> {
        self.arrivals.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an arrival on `route` now.
    pub fn record_arrival(&self, route: &str) {
        let mut arrivals = self.write();
        // Stamped under the lock so concurrent writers append in order.
        append(&mut arrivals, route, now_millis());
    }

    /// Record an arrival on `route` (and the global sequence) at `ts_ms`.
    ///
    /// A timestamp older than the newest one recorded is raised to it, so
    /// every sequence stays non-decreasing even if the clock steps back.
    pub fn record_arrival_at(&self, route: &str, ts_ms: i64) {
        let mut arrivals = self.write();
        append(&mut arrivals, route, ts_ms);
    }

    /// Arrivals on `route` within the trailing `window`.
    pub fn count_in_window(&self, route: &str, window: Duration) -> usize {
        self.count_in_window_at(route, window, now_millis())
    }

    /// Arrivals on `route` within `window` before `now_ms`, evicting older ones.
    pub fn count_in_window_at(&self, route: &str, window: Duration, now_ms: i64) -> usize {
        let cutoff = cutoff(window, now_ms);
        let mut arrivals = self.write();
        match arrivals.get_mut(route) {
            Some(seq) => evict_before(seq, cutoff),
            None => 0,
        }
    }

    /// Arrivals within the trailing `window` for every tracked route.
    pub fn counts_in_window(&self, window: Duration) -> HashMap<String, usize> {
        self.counts_in_window_at(window, now_millis())
    }

    pub fn counts_in_window_at(&self, window: Duration, now_ms: i64) -> HashMap<String, usize> {
        let cutoff = cutoff(window, now_ms);
        let mut arrivals = self.write();
        arrivals
            .iter_mut()
            .map(|(route, seq)| (route.clone(), evict_before(seq, cutoff)))
            .collect()
    }
}

fn append(arrivals: &mut HashMap<String, VecDeque<i64>>, route: &str, ts_ms: i64) {
    push_ordered(arrivals.entry(GLOBAL_ROUTE.to_string()).or_default(), ts_ms);
    if route != GLOBAL_ROUTE {
        match arrivals.get_mut(route) {
            Some(seq) => push_ordered(seq, ts_ms),
            None => {
                arrivals.insert(route.to_string(), VecDeque::from([ts_ms]));
            }
        }
    }
}

fn push_ordered(seq: &mut VecDeque<i64>, ts_ms: i64) {
    let ts = seq.back().map_or(ts_ms, |&last| ts_ms.max(last));
    seq.push_back(ts);
}

fn cutoff(window: Duration, now_ms: i64) -> i64 {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(window_ms)
}

/// Drop the prefix older than `cutoff` and return what remains.
fn evict_before(seq: &mut VecDeque<i64>, cutoff: i64) -> usize {
    let stale = seq.iter().position(|&ts| ts >= cutoff).unwrap_or(seq.len());
    if stale > 0 {
        seq.drain(..stale);
    }
    seq.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEC: i64 = 1000;
    const BASE: i64 = 1_700_000_000_000;

    #[test]
    fn test_window_scenario() {
        let window = RequestWindow::new();
        for t in 0..5 {
            window.record_arrival_at("/a", BASE + t * SEC);
        }
        let ten = Duration::from_secs(10);
        assert_eq!(window.count_in_window_at("/a", ten, BASE + 4 * SEC), 5);
        // Only t=0 has fallen out of the window at t=11.
        assert_eq!(window.count_in_window_at("/a", ten, BASE + 11 * SEC), 4);
        assert_eq!(window.count_in_window_at("/a", ten, BASE + 15 * SEC), 0);
    }

    #[test]
    fn test_all_expired_after_window() {
        let window = RequestWindow::new();
        for t in 0..5 {
            window.record_arrival_at("/a", BASE + t * SEC);
        }
        let ten = Duration::from_secs(10);
        assert_eq!(window.count_in_window_at("/a", ten, BASE + 4 * SEC), 5);
        // Everything arrived more than 10s before t=14.5.
        assert_eq!(window.count_in_window_at("/a", ten, BASE + 14 * SEC + 500), 0);
    }

    #[test]
    fn test_global_sequence_sees_every_route() {
        let window = RequestWindow::new();
        window.record_arrival_at("/a", BASE);
        window.record_arrival_at("/b", BASE);
        window.record_arrival_at("/b", BASE + SEC);

        let ten = Duration::from_secs(10);
        let counts = window.counts_in_window_at(ten, BASE + 2 * SEC);
        assert_eq!(counts[GLOBAL_ROUTE], 3);
        assert_eq!(counts["/a"], 1);
        assert_eq!(counts["/b"], 2);
    }

    #[test]
    fn test_unknown_route_is_zero() {
        let window = RequestWindow::new();
        assert_eq!(window.count_in_window("/missing", Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_eviction_is_permanent() {
        let window = RequestWindow::new();
        window.record_arrival_at("/a", BASE);
        window.record_arrival_at("/a", BASE + 20 * SEC);

        let ten = Duration::from_secs(10);
        assert_eq!(window.count_in_window_at("/a", ten, BASE + 25 * SEC), 1);
        // A wider window cannot resurrect the evicted arrival.
        let hour = Duration::from_secs(3600);
        assert_eq!(window.count_in_window_at("/a", hour, BASE + 25 * SEC), 1);
    }

    fn sequence(window: &RequestWindow, route: &str) -> Vec<i64> {
        window.write().get(route).map(|seq| seq.iter().copied().collect()).unwrap_or_default()
    }

    fn is_non_decreasing(seq: &[i64]) -> bool {
        seq.windows(2).all(|pair| pair[0] <= pair[1])
    }

    #[test]
    fn test_backward_timestamp_is_raised() {
        let window = RequestWindow::new();
        window.record_arrival_at("/a", BASE + 2 * SEC);
        window.record_arrival_at("/a", BASE + SEC);

        assert_eq!(sequence(&window, "/a"), vec![BASE + 2 * SEC; 2]);
        assert_eq!(sequence(&window, GLOBAL_ROUTE), vec![BASE + 2 * SEC; 2]);

        // Nothing older than the newest arrival can linger behind it.
        let one = Duration::from_secs(1);
        assert_eq!(window.count_in_window_at("/a", one, BASE + 3 * SEC + 500), 0);
    }

    #[test]
    fn test_concurrent_writers_keep_order() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 5_000;

        let window = RequestWindow::new();
        std::thread::scope(|scope| {
            for i in 0..THREADS {
                let window = &window;
                scope.spawn(move || {
                    let own = format!("/t{}", i);
                    for n in 0..PER_THREAD {
                        let route = if n % 2 == 0 { "/shared" } else { own.as_str() };
                        window.record_arrival(route);
                    }
                });
            }
        });

        let hour = Duration::from_secs(3600);
        assert_eq!(window.count_in_window(GLOBAL_ROUTE, hour), THREADS * PER_THREAD);
        assert_eq!(window.count_in_window("/shared", hour), THREADS * PER_THREAD / 2);
        for i in 0..THREADS {
            assert_eq!(window.count_in_window(&format!("/t{}", i), hour), PER_THREAD / 2);
        }

        let arrivals = window.write();
        assert_eq!(arrivals.len(), THREADS + 2);
        for (route, seq) in arrivals.iter() {
            let seq: Vec<i64> = seq.iter().copied().collect();
            assert!(is_non_decreasing(&seq), "sequence for {:?} went backwards", route);
        }
    }

    proptest! {
        #[test]
        fn prop_count_matches_arrivals_in_window(
            gaps in proptest::collection::vec(0i64..5_000, 0..200),
            window_ms in 1i64..60_000,
            lag_ms in 0i64..30_000,
        ) {
            let tracker = RequestWindow::new();
            let mut ts = BASE;
            let mut stamps = Vec::with_capacity(gaps.len());
            for gap in gaps {
                ts += gap;
                tracker.record_arrival_at("/p", ts);
                stamps.push(ts);
            }
            let now = ts + lag_ms;
            let expected = stamps.iter().filter(|&&t| t >= now - window_ms).count();
            let window = Duration::from_millis(window_ms as u64);
            prop_assert_eq!(tracker.count_in_window_at("/p", window, now), expected);
            prop_assert_eq!(tracker.count_in_window_at("/p", window, now), expected);
        }
    }
}
