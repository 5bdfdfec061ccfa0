//! Server-sent event stream of samples.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::{stream, Stream};
use tokio::sync::watch;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::stream::hub::Subscription;
use crate::tracker::Monitor;

struct StreamState {
    monitor: Arc<Monitor>,
    subscription: Subscription,
    ticker: Interval,
    closed: watch::Receiver<bool>,
}

enum Wake {
    Tick,
    Signal,
    Stop,
}

impl StreamState {
    async fn next_wake(&mut self) -> Wake {
        if *self.closed.borrow() {
            return Wake::Stop;
        }
        tokio::select! {
            _ = self.ticker.tick() => Wake::Tick,
            signalled = self.subscription.recv() => {
                if signalled { Wake::Signal } else { Wake::Stop }
            }
            _ = self.closed.changed() => Wake::Stop,
        }
    }
}

/// Stream a fresh sample on every tick and every hub signal.
///
/// Ends when `closed` flips to true or the hub releases the subscription.
/// Dropping the stream unsubscribes from the hub.
pub fn sample_events(
    monitor: Arc<Monitor>,
    interval: Duration,
    closed: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let subscription = monitor.subscribe();
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        monitor,
        subscription,
        ticker,
        closed,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            match state.next_wake().await {
                Wake::Stop => {
                    tracing::debug!(subscriber = ?state.subscription.id(), "Metrics stream closed");
                    return None;
                }
                Wake::Tick => {}
                // One sample covers a burst of signals.
                Wake::Signal => {
                    state.subscription.drain();
                }
            }

            let sample = state.monitor.current_sample();
            match Event::default().json_data(sample) {
                Ok(event) => return Some((Ok(event), state)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode sample, skipping event");
                }
            }
        }
    })
}
