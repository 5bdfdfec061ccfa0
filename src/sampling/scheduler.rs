//! Sampling scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::observability::metrics;
use crate::tracker::Monitor;

/// Background task pushing one sample per tick into history.
pub struct Sampler {
    monitor: Arc<Monitor>,
    interval: Duration,
}

impl Sampler {
    pub fn new(monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    /// Sample until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            capacity = self.monitor.history().capacity(),
            "Sampler starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = self.monitor.push_sample();
                    metrics::record_sample(&sample);
                    tracing::trace!(
                        tasks = sample.tasks,
                        requests = sample.requests,
                        heap_alloc = sample.heap_alloc,
                        "Sample recorded"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sampler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ProcessProbe, TaskRegistry};
    use crate::tracker::MonitorSettings;

    #[tokio::test]
    async fn test_sampler_fills_history_until_shutdown() {
        let probe = Arc::new(ProcessProbe::new(Arc::new(TaskRegistry::new())));
        let monitor = Arc::new(Monitor::new(MonitorSettings::default(), probe));
        let (tx, rx) = broadcast::channel(1);

        let sampler = Sampler::new(monitor.clone(), Duration::from_millis(20));
        let task = tokio::spawn(sampler.run(rx));

        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(()).unwrap();
        task.await.unwrap();

        let taken = monitor.history().len();
        assert!(taken >= 3, "only {taken} samples");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(monitor.history().len(), taken);
    }
}
