//! Publish/subscribe fan-out of "new data" signals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::observability::metrics;

/// Identifier of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Registry of subscriber mailboxes.
#[derive(Debug)]
pub struct Hub {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<()>>>,
    capacity: usize,
}

impl Hub {
    /// Create a hub whose subscribers each buffer up to `capacity` signals.
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, mpsc::Sender<()>>> {
        self.subscribers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, mpsc::Sender<()>>> {
        self.subscribers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscriber mailbox.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        let count = {
            let mut subscribers = self.write();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        metrics::record_subscribers(count);
        tracing::debug!(subscriber = id.0, subscribers = count, "Stream subscriber registered");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber and release its mailbox.
    ///
    /// Returns false if `id` was not registered (already removed).
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.write();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            metrics::record_subscribers(count);
            tracing::debug!(subscriber = id.0, subscribers = count, "Stream subscriber removed");
        }
        removed
    }

    /// Signal every subscriber without waiting.
    ///
    /// Subscribers with a full mailbox miss this signal. Returns how many
    /// subscribers received it.
    pub fn notify(&self) -> usize {
        let subscribers = self.read();
        let mut delivered = 0;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(())) => {
                    tracing::trace!(subscriber = id.0, "Subscriber mailbox full, signal dropped");
                }
                Err(TrySendError::Closed(())) => {}
            }
        }
        delivered
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving side of a hub registration. Unsubscribes when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<()>,
    hub: Weak<Hub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next signal. Returns false once the mailbox is released.
    pub async fn recv(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Take one pending signal if there is one.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Discard all pending signals, returning how many there were.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_skips_full_subscriber() {
        let hub = Arc::new(Hub::new(100));
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let mut full = hub.subscribe();

        // Saturate one mailbox through the hub itself, then drain the others.
        for _ in 0..100 {
            hub.notify();
        }
        assert_eq!(a.drain(), 100);
        assert_eq!(b.drain(), 100);

        assert_eq!(hub.notify(), 2);
        assert!(a.try_recv());
        assert!(b.try_recv());
        assert_eq!(full.drain(), 100);
    }

    #[test]
    fn test_full_subscriber_misses_only_while_full() {
        let hub = Arc::new(Hub::new(2));
        let mut sub = hub.subscribe();
        assert_eq!(hub.notify(), 1);
        assert_eq!(hub.notify(), 1);
        assert_eq!(hub.notify(), 0);
        assert_eq!(hub.notify(), 0);

        assert!(sub.try_recv());
        assert_eq!(hub.notify(), 1);
        assert_eq!(sub.drain(), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let hub = Arc::new(Hub::new(4));
        let mut sub = hub.subscribe();
        let other = hub.subscribe();
        let id = sub.id();

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.len(), 1);

        assert_eq!(hub.notify(), 1);
        assert!(!sub.try_recv());
        drop(other);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Arc::new(Hub::new(4));
        {
            let _sub = hub.subscribe();
            assert_eq!(hub.len(), 1);
        }
        assert!(hub.is_empty());
        assert_eq!(hub.notify(), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_after_unsubscribe() {
        let hub = Arc::new(Hub::new(4));
        let mut sub = hub.subscribe();
        hub.notify();
        assert!(sub.recv().await);
        hub.unsubscribe(sub.id());
        assert!(!sub.recv().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_churn_leaves_hub_empty() {
        let hub = Arc::new(Hub::new(8));

        let notifier = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for _ in 0..5_000 {
                    hub.notify();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut clients = Vec::new();
        for _ in 0..16 {
            let hub = hub.clone();
            clients.push(tokio::spawn(async move {
                for round in 0..200 {
                    let mut sub = hub.subscribe();
                    hub.notify();
                    assert!(sub.try_recv());
                    if round % 3 == 0 {
                        assert!(hub.unsubscribe(sub.id()));
                    }
                    drop(sub);
                    tokio::task::yield_now().await;
                }
            }));
        }

        for client in clients {
            client.await.unwrap();
        }
        notifier.await.unwrap();
        assert!(hub.is_empty());
        assert_eq!(hub.notify(), 0);
    }
}
