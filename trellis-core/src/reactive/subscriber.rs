//! Change subscribers.
//!
//! Subscribers are told which state containers changed; they re-read
//! whatever they need through the instance.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivered once per outermost mutation call that wrote state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Names of the written state containers, in first-write order.
    pub states: Vec<String>,
}

impl Change {
    pub fn touches(&self, state: &str) -> bool {
        self.states.iter().any(|s| s == state)
    }
}

type Callback = Arc<dyn Fn(&Change) + Send + Sync>;
type Entries = RwLock<IndexMap<SubscriberId, Callback>>;

#[derive(Default)]
pub(crate) struct SubscriberList {
    entries: Arc<Entries>,
}

impl SubscriberList {
    pub(crate) fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.entries.write().insert(id, Arc::new(callback));
        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Call every subscriber. The list is snapshotted first, so callbacks may
    /// subscribe or unsubscribe freely.
    pub(crate) fn notify(&self, change: &Change) {
        let callbacks: Vec<Callback> = self.entries.read().values().cloned().collect();
        tracing::trace!(subscribers = callbacks.len(), states = ?change.states, "notifying");
        for callback in callbacks {
            callback(change);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Keeps a subscription alive. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    entries: Weak<Entries>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.write().shift_remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ---- Tests ----
