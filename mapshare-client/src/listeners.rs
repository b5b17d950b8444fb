//! Listener registry shared by the stores.
//!
//! Stores hand out RAII [`Subscription`] guards instead of unsubscribe
//! functions; dropping the guard removes the listener, and the store's
//! drop closure deactivates the underlying event channel or stream when
//! the last listener goes away.

use std::collections::HashMap;
use std::sync::Arc;

/// A registered change listener. Invoked with no arguments; the
/// listener re-reads the store's snapshot.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// A set of change listeners keyed by registration id.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

impl ListenerSet {
    /// Register a listener and return its id.
    pub(crate) fn insert(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, listener);
        id
    }

    /// Remove a listener by id.
    pub(crate) fn remove(&mut self, id: u64) {
        self.listeners.remove(&id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Clone out the current listeners so they can be invoked after the
    /// store's lock is released.
    pub(crate) fn callbacks(&self) -> Vec<Listener> {
        self.listeners.values().cloned().collect()
    }
}

/// RAII guard for a store subscription.
///
/// Dropping the guard unregisters the listener. When the last listener
/// of a store is removed, the store stops listening to its underlying
/// event channel or progress stream.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
