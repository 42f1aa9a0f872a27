//! Publish/subscribe delivery of session events
//!
//! Two kinds of consumers are supported:
//! - callbacks registered with [`EventBus::subscribe`], invoked synchronously
//!   in commit order, removed when their [`Subscription`] is dropped or
//!   explicitly unsubscribed;
//! - async consumers holding a [`broadcast::Receiver`] from
//!   [`EventBus::stream`].
//!
//! There is no buffering or replay: a subscriber only sees events published
//! after it attached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use geovps_core::prelude::trace;
use geovps_core::SessionEvent;
use tokio::sync::broadcast;

/// Default capacity of the async event stream
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct BusInner {
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
    stream_tx: broadcast::Sender<SessionEvent>,
    diagnostics: bool,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }
}

/// Fan-out of [`SessionEvent`]s to callbacks and async streams
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("stream_receivers", &self.inner.stream_tx.receiver_count())
            .field("diagnostics", &self.inner.diagnostics)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, false)
    }
}

impl EventBus {
    /// Create a bus. `diagnostics` gates [`EventBus::diagnostic`] lines.
    pub fn new(channel_capacity: usize, diagnostics: bool) -> Self {
        let (stream_tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                stream_tx,
                diagnostics,
            }),
        }
    }

    /// Register a callback for every subsequent event.
    ///
    /// Callbacks run on the thread that commits the event, while the session
    /// is locked. They may call `SessionController::state` but nothing else
    /// on the controller: `has_session`, `is_polling`, the queries and the
    /// commands all take the session lock and would deadlock.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        trace!("Event subscriber {} attached", id);

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Receive events asynchronously
    pub fn stream(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.stream_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.inner.diagnostics
    }

    /// Deliver an event to every current subscriber, in registration order
    pub(crate) fn publish(&self, event: SessionEvent) {
        // Snapshot so callbacks can unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in &callbacks {
            callback(&event);
        }

        // No receivers is fine.
        let _ = self.inner.stream_tx.send(event);
    }

    /// Publish a diagnostic line when diagnostics are enabled
    pub(crate) fn diagnostic(&self, message: impl Into<String>) {
        if self.inner.diagnostics {
            self.publish(SessionEvent::diagnostic(message));
        }
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
///
/// Dropping it removes the callback.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback now. Returns false if the bus is already gone.
    pub fn unsubscribe(self) -> bool {
        // Drop runs afterwards and finds nothing left to remove.
        self.bus
            .upgrade()
            .map(|bus| bus.remove(self.id))
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}
