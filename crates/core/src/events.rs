//! Synchronous publish/subscribe bus
//!
//! Every component publishes a closed set of tagged events through an
//! [`EventBus`]. Handlers run on the publishing thread, in registration
//! order. A handler that returns an error or panics is logged and skipped;
//! the remaining handlers still see the event.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Error type a handler may return
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handler callback
pub type Handler<E> = Arc<dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync>;

/// An event that can be routed by kind
pub trait BusEvent: Debug + Send + Sync + 'static {
    /// Discriminant used for subscription filtering
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<E: BusEvent> {
    id: SubscriptionId,
    /// `None` receives every event
    filter: Option<E::Kind>,
    handler: Handler<E>,
}

impl<E: BusEvent> Clone for Subscription<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            filter: self.filter,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Publish/subscribe bus for events of type `E`
pub struct EventBus<E: BusEvent> {
    subscriptions: Mutex<Vec<Subscription<E>>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for one event kind
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.insert(Some(kind), Arc::new(handler))
    }

    /// Register a handler for every event kind
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(handler))
    }

    fn insert(&self, filter: Option<E::Kind>, handler: Handler<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            filter,
            handler,
        });
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Deliver an event to matching handlers
    ///
    /// The handler list is snapshotted first, so handlers registered while
    /// this call is running do not receive the event. Returns the number of
    /// handlers that completed successfully.
    pub fn publish(&self, event: &E) -> usize {
        let kind = event.kind();
        let targets: Vec<Subscription<E>> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.filter.map_or(true, |k| k == kind))
            .cloned()
            .collect();

        let mut delivered = 0;
        for sub in targets {
            match catch_unwind(AssertUnwindSafe(|| (sub.handler)(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(event = ?kind, error = %e, "Event handler failed");
                }
                Err(_) => {
                    tracing::error!(event = ?kind, "Event handler panicked");
                }
            }
        }
        delivered
    }

    /// Remove handlers for one kind, or every handler when `kind` is `None`
    ///
    /// Clearing a single kind leaves catch-all handlers in place.
    pub fn clear(&self, kind: Option<E::Kind>) {
        let mut subs = self.subscriptions.lock();
        match kind {
            Some(k) => subs.retain(|s| s.filter != Some(k)),
            None => subs.clear(),
        }
    }

    /// Number of handlers that would receive an event of this kind
    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.filter.map_or(true, |k| k == kind))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
