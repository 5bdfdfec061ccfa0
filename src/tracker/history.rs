//! Bounded sample history.

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::tracker::now_millis;
use crate::tracker::sample::Sample;

/// Window used when a non-positive window is requested.
pub const DEFAULT_WINDOW_SECS: i64 = 600;

/// FIFO buffer of samples, oldest first, capped at `capacity` entries.
#[derive(Debug)]
pub struct History {
    samples: RwLock<VecDeque<Sample>>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<Sample>> {
        self.samples.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<Sample>> {
        self.samples.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Append a sample, discarding the oldest ones beyond capacity.
    pub fn push(&self, sample: Sample) {
        let mut samples = self.write();
        samples.push_back(sample);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Copy of the whole history, oldest first.
    pub fn all(&self) -> Vec<Sample> {
        self.read().iter().copied().collect()
    }

    /// Samples from the trailing `seconds`, oldest first.
    pub fn window(&self, seconds: i64) -> Vec<Sample> {
        self.window_at(seconds, now_millis())
    }

    /// Samples no older than `seconds` before `now_ms`, oldest first.
    pub fn window_at(&self, seconds: i64, now_ms: i64) -> Vec<Sample> {
        let seconds = if seconds <= 0 { DEFAULT_WINDOW_SECS } else { seconds };
        let cutoff = now_ms.saturating_sub(seconds.saturating_mul(1000));

        let samples = self.read();
        // Newest entries are at the back; stop at the first one too old.
        let start = samples
            .iter()
            .rposition(|s| s.time < cutoff)
            .map(|i| i + 1)
            .unwrap_or(0);
        samples.range(start..).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{BlockCounts, MemoryStats};

    const BASE: i64 = 1_700_000_000_000;

    fn sample_at(time: i64) -> Sample {
        Sample::new(time, 1, 0, MemoryStats::default(), 0, BlockCounts::default())
    }

    #[test]
    fn test_bounded_fifo() {
        let history = History::new(600);
        for i in 0..700 {
            history.push(sample_at(BASE + i * 1000));
        }
        let all = history.all();
        assert_eq!(all.len(), 600);
        // First retained sample is the 101st pushed.
        assert_eq!(all[0].time, BASE + 100 * 1000);
        assert_eq!(all[599].time, BASE + 699 * 1000);
        assert!(all.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let history = History::new(10);
        for i in 0..4 {
            history.push(sample_at(BASE + i));
        }
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_window_returns_recent_samples() {
        let history = History::new(100);
        for i in 0..60 {
            history.push(sample_at(BASE + i * 1000));
        }
        let now = BASE + 59 * 1000;
        let recent = history.window_at(10, now);
        assert_eq!(recent.len(), 11);
        assert_eq!(recent[0].time, BASE + 49 * 1000);
        assert_eq!(recent.last().unwrap().time, now);
    }

    #[test]
    fn test_window_defaults_when_not_positive() {
        let history = History::new(2000);
        for i in 0..1000 {
            history.push(sample_at(BASE + i * 1000));
        }
        let now = BASE + 999 * 1000;
        assert_eq!(history.window_at(0, now).len(), 601);
        assert_eq!(history.window_at(-5, now).len(), 601);
    }

    #[test]
    fn test_window_on_empty_history() {
        let history = History::new(10);
        assert!(history.window(60).is_empty());
        assert!(history.all().is_empty());
    }

    #[test]
    fn test_concurrent_pushes_respect_bound_and_order() {
        const THREADS: usize = 8;
        const PER_THREAD: i64 = 2_000;

        let history = History::new(1_000);
        std::thread::scope(|scope| {
            for writer in 0..THREADS {
                let history = &history;
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        let mut sample = sample_at(BASE + i);
                        sample.tasks = writer;
                        history.push(sample);
                    }
                });
            }
        });

        let all = history.all();
        assert_eq!(all.len(), 1_000);
        for writer in 0..THREADS {
            let times: Vec<i64> = all.iter().filter(|s| s.tasks == writer).map(|s| s.time).collect();
            assert!(times.windows(2).all(|w| w[0] < w[1]), "writer {} out of order", writer);
            if let Some(&last) = times.last() {
                assert_eq!(last, BASE + PER_THREAD - 1);
            }
        }
    }
}
