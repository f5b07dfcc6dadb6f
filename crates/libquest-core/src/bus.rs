//! Synchronous in-process event bus for quest events.
//!
//! Handlers run on the publisher's call stack, in subscription order. A
//! handler that returns an error or panics is logged and skipped; the
//! remaining handlers still run and the publisher never sees the failure.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::QuestError;
use crate::types::event::QuestEvent;

/// Result returned by an event handler
pub type HandlerResult = Result<(), QuestError>;

/// A subscribed event handler. Identity is the `Rc` allocation.
pub type EventHandler = Rc<dyn Fn(&QuestEvent) -> HandlerResult>;

struct HandlerEntry {
    id: u64,
    handler: EventHandler,
}

struct BusInner {
    handlers: RefCell<Vec<HandlerEntry>>,
    next_id: Cell<u64>,
    events_published: Cell<u64>,
    clock: Rc<dyn Clock>,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner")
            .field("handlers", &self.handlers.borrow().len())
            .field("events_published", &self.events_published.get())
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the handler is still registered
    pub fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .map_or(false, |bus| bus.handlers.borrow().iter().any(|h| h.id == self.id))
    }

    /// Remove the handler. Returns `false` if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let mut handlers = bus.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|h| h.id != self.id);
        let removed = handlers.len() != before;
        if removed {
            debug!(subscription = self.id, "handler unsubscribed");
        }
        removed
    }
}

/// Synchronous publish/subscribe bus. Cloning shares the same bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(BusInner {
                handlers: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                events_published: Cell::new(0),
                clock,
            }),
        }
    }

    /// Register a handler.
    ///
    /// Subscribing the same `Rc` twice returns a handle to the existing
    /// registration instead of adding a second one.
    pub fn subscribe(&self, handler: EventHandler) -> Subscription {
        let mut handlers = self.inner.handlers.borrow_mut();

        let key = Rc::as_ptr(&handler) as *const ();
        if let Some(existing) = handlers
            .iter()
            .find(|h| Rc::as_ptr(&h.handler) as *const () == key)
        {
            return Subscription {
                bus: Rc::downgrade(&self.inner),
                id: existing.id,
            };
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        handlers.push(HandlerEntry { id, handler });
        debug!(subscription = id, "handler subscribed");

        Subscription {
            bus: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Register a closure as a handler
    pub fn subscribe_fn<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&QuestEvent) -> HandlerResult + 'static,
    {
        self.subscribe(Rc::new(handler))
    }

    /// Stamp `event` with the current time if it has none, then deliver it
    /// to every handler subscribed at this moment. Returns the delivered
    /// event.
    pub fn publish(&self, mut event: QuestEvent) -> QuestEvent {
        if event.timestamp.is_none() {
            event.timestamp = Some(self.inner.clock.now_ms());
        }
        self.inner
            .events_published
            .set(self.inner.events_published.get() + 1);

        // Handlers may subscribe or unsubscribe while we dispatch
        let snapshot: Vec<(u64, EventHandler)> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .map(|h| (h.id, Rc::clone(&h.handler)))
            .collect();

        debug!(
            kind = event.kind.as_str(),
            quest_id = %event.quest_id,
            handlers = snapshot.len(),
            "publishing quest event"
        );

        for (id, handler) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| (*handler)(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(subscription = id, kind = event.kind.as_str(), "event handler failed: {}", e);
                }
                Err(payload) => {
                    warn!(
                        subscription = id,
                        kind = event.kind.as_str(),
                        "event handler panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        event
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// Total events published since the bus was created
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.get()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
