//! Lifecycle event publication.
//!
//! Explicit publish/subscribe decoupled from any UI runtime. Delivery is
//! synchronous and isolated per subscriber: a panicking listener is
//! logged and unwound without preventing delivery to the rest.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use steeple_domain::SyncEvent;

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Handle returned by [`SyncEventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous lifecycle event bus.
#[derive(Default)]
pub struct SyncEventBus {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl SyncEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns the handle needed to remove it.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        SubscriptionId(id)
    }

    /// Remove a listener; returns false when the handle is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.listeners.lock() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|(listener_id, _)| *listener_id != id.0);
                listeners.len() != before
            }
            Err(_) => false,
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|listeners| listeners.len()).unwrap_or(0)
    }

    /// Deliver an event to every subscriber, in subscription order.
    ///
    /// Listeners run outside the registry lock, so a subscriber may
    /// subscribe or unsubscribe from within its callback.
    pub fn publish(&self, event: &SyncEvent) {
        let snapshot: Vec<(u64, Listener)> = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(subscription = id, kind = %event.kind, "sync event listener panicked");
            }
        }
    }
}
