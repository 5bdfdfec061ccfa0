//! Request and process tracking subsystem.
//!
//! # Data Flow
//! ```text
//! tracking middleware
//!     → Monitor::record_request (window.rs + hub notify)
//!     → Monitor::record_completion (resources.rs)
//!
//! sampler tick / GET /metrics
//!     → RuntimeProbe (memory, task count, task dump)
//!     → classify (blocking counts)
//!     → Sample (sample.rs) → history.rs
//!
//! GET /metrics/routes
//!     → window counts + classify_by_route + averages → routes.rs
//! ```
//!
//! # Design Decisions
//! - One `Monitor` per process, shared through `Arc` and injected into
//!   handlers, the sampler and stream consumers
//! - Window, resource and history state each sit behind their own lock
//! - No ordering between components: a sample and a route query taken at the
//!   same moment may disagree slightly

pub mod history;
pub mod resources;
pub mod routes;
pub mod sample;
pub mod window;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::MonitorConfig;
use crate::runtime::{classify, classify_by_route, MemoryStats, RuntimeProbe};
use crate::stream::hub::{Hub, Subscription};

pub use history::History;
pub use resources::{ResourceAverage, RouteResources};
pub use routes::RouteStat;
pub use sample::Sample;
pub use window::RequestWindow;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Sizing for a [`Monitor`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Trailing window for request counts.
    pub request_window: Duration,
    /// Maximum samples retained in history.
    pub history_capacity: usize,
    /// Pending signals each hub subscriber can hold.
    pub subscriber_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            request_window: Duration::from_secs(10),
            history_capacity: 86_400,
            subscriber_capacity: 100,
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            request_window: Duration::from_secs(config.sampling.request_window_secs),
            history_capacity: config.sampling.history_capacity,
            subscriber_capacity: config.stream.subscriber_capacity,
        }
    }
}

/// Process-wide tracker service.
pub struct Monitor {
    window: RequestWindow,
    resources: RouteResources,
    history: History,
    hub: Arc<Hub>,
    probe: Arc<dyn RuntimeProbe>,
    last_reclaims: AtomicU32,
    request_window: Duration,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, probe: Arc<dyn RuntimeProbe>) -> Self {
        let last_reclaims = AtomicU32::new(probe.memory().reclaims);
        Self {
            window: RequestWindow::new(),
            resources: RouteResources::new(),
            history: History::new(settings.history_capacity),
            hub: Arc::new(Hub::new(settings.subscriber_capacity)),
            probe,
            last_reclaims,
            request_window: settings.request_window,
        }
    }

    pub fn probe(&self) -> &Arc<dyn RuntimeProbe> {
        &self.probe
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn window(&self) -> &RequestWindow {
        &self.window
    }

    pub fn resources(&self) -> &RouteResources {
        &self.resources
    }

    /// Record an inbound request on `route` and wake stream subscribers.
    pub fn record_request(&self, route: &str) {
        self.window.record_arrival(route);
        self.hub.notify();
    }

    /// Attribute the cost of one completed request to `route`.
    pub fn record_completion(&self, route: &str, heap_delta: u64, elapsed: Duration) {
        self.resources.add_memory_delta(route, heap_delta);
        self.resources.add_cpu_time(route, elapsed);
    }

    /// Register a stream subscriber on the hub.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Build a sample of the process right now.
    ///
    /// `gc_increment` counts reclamations since the last sample stored in
    /// history; on-demand samples do not move that baseline.
    pub fn current_sample(&self) -> Sample {
        let memory = self.probe.memory();
        let previous = self.last_reclaims.load(Ordering::Relaxed);
        self.build_sample(memory, previous)
    }

    /// Take a sample, append it to history and notify subscribers.
    pub fn push_sample(&self) -> Sample {
        let memory = self.probe.memory();
        let previous = self.last_reclaims.swap(memory.reclaims, Ordering::Relaxed);
        let sample = self.build_sample(memory, previous);
        self.history.push(sample);
        self.hub.notify();
        sample
    }

    fn build_sample(&self, memory: MemoryStats, previous_reclaims: u32) -> Sample {
        let blocks = classify(&self.probe.task_dump());
        Sample::new(
            now_millis(),
            self.probe.scheduled_tasks(),
            self.window.count_in_window(window::GLOBAL_ROUTE, self.request_window),
            memory,
            sample::gc_increment(previous_reclaims, memory.reclaims),
            blocks,
        )
    }

    /// Statistics for every route currently visible.
    pub fn route_stats(&self) -> Vec<RouteStat> {
        let counts = self.window.counts_in_window(self.request_window);
        let blocks = classify_by_route(&self.probe.task_dump());
        routes::aggregate(&counts, &blocks, &self.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Probe returning scripted values.
    #[derive(Default)]
    struct FakeProbe {
        memory: Mutex<MemoryStats>,
        dump: Mutex<String>,
    }

    impl RuntimeProbe for FakeProbe {
        fn memory(&self) -> MemoryStats {
            *self.memory.lock().unwrap()
        }

        fn scheduled_tasks(&self) -> usize {
            3
        }

        fn task_dump(&self) -> String {
            self.dump.lock().unwrap().clone()
        }
    }

    fn monitor_with(probe: Arc<FakeProbe>) -> Monitor {
        Monitor::new(MonitorSettings::default(), probe)
    }

    #[test]
    fn test_sample_reflects_probe_and_requests() {
        let probe = Arc::new(FakeProbe::default());
        *probe.dump.lock().unwrap() =
            "task 1 [semacquire, 20 seconds]:\nlabels: route=/a\n\ntask 2 [IO wait]:\n".to_string();
        *probe.memory.lock().unwrap() = MemoryStats {
            heap_alloc: 1024,
            heap_inuse: 2048,
            heap_sys: 4096,
            heap_objects: 8,
            reclaims: 0,
        };
        let monitor = monitor_with(probe);
        monitor.record_request("/a");
        monitor.record_request("/b");

        let sample = monitor.current_sample();
        assert_eq!(sample.tasks, 3);
        assert_eq!(sample.requests, 2);
        assert_eq!(sample.heap_alloc, 1024);
        assert_eq!((sample.block_lock, sample.block_io, sample.block_perm), (1, 1, 1));
    }

    #[test]
    fn test_gc_increment_tracks_previous_stored_sample() {
        let probe = Arc::new(FakeProbe::default());
        let monitor = monitor_with(probe.clone());

        probe.memory.lock().unwrap().reclaims = 40;
        assert_eq!(monitor.push_sample().gc_increment, 40);
        probe.memory.lock().unwrap().reclaims = 55;
        assert_eq!(monitor.push_sample().gc_increment, 15);
        // Counter went backwards: take the new absolute value.
        probe.memory.lock().unwrap().reclaims = 4;
        let sample = monitor.push_sample();
        assert_eq!(sample.gc_increment, 4);
        assert_eq!(sample.num_gc, 4);
    }

    #[test]
    fn test_on_demand_samples_keep_history_baseline() {
        let probe = Arc::new(FakeProbe::default());
        let monitor = monitor_with(probe.clone());

        probe.memory.lock().unwrap().reclaims = 10;
        monitor.push_sample();

        probe.memory.lock().unwrap().reclaims = 25;
        assert_eq!(monitor.current_sample().gc_increment, 15);
        probe.memory.lock().unwrap().reclaims = 30;
        assert_eq!(monitor.current_sample().gc_increment, 20);

        let stored = monitor.push_sample();
        assert_eq!(stored.gc_increment, 20);
        assert_eq!(monitor.history().all()[1].gc_increment, 20);
    }

    #[test]
    fn test_push_sample_fills_history_and_notifies() {
        let monitor = monitor_with(Arc::new(FakeProbe::default()));
        let mut sub = monitor.subscribe();
        monitor.push_sample();
        monitor.push_sample();
        assert_eq!(monitor.history().len(), 2);
        assert!(sub.try_recv());
        assert!(sub.try_recv());
        assert!(!sub.try_recv());
    }

    #[test]
    fn test_route_stats_combine_sources() {
        let probe = Arc::new(FakeProbe::default());
        *probe.dump.lock().unwrap() = "task 4 [semacquire]:\nlabels: route=/slow\n".to_string();
        let monitor = monitor_with(probe);

        for _ in 0..4 {
            monitor.record_request("/fast");
            monitor.record_completion("/fast", 2 * 1024 * 1024, Duration::from_millis(3));
        }

        let mut stats = monitor.route_stats();
        stats.sort_by(|a, b| a.route.cmp(&b.route));
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].route, "/fast");
        assert_eq!(stats[0].requests, 4);
        assert!((stats[0].memory_usage - 8.0).abs() < 1e-9);
        assert!((stats[0].cpu_usage - 12.0).abs() < 1e-9);

        assert_eq!(stats[1].route, "/slow");
        assert_eq!(stats[1].requests, 0);
        assert_eq!(stats[1].block_lock, 1);
    }
}
