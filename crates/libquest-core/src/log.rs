//! Capped, persisted history of quest events.
//!
//! The log keeps the most recent `capacity` events (1000 by default),
//! evicting the oldest first. It is an audit trail: canonical quest state
//! lives in [`crate::store::QuestStore`], never here.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::bus::{EventBus, Subscription};
use crate::error::QuestError;
use crate::kv::KvStore;
use crate::persist::{Migrate, PersistedSlot};
use crate::types::event::{QuestEvent, QuestEventType};

/// Storage key owned by the event log
pub const EVENT_LOG_KEY: &str = "quest-event-log";

/// Default number of events retained
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Persisted form of the log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLogState {
    #[serde(default)]
    pub events: VecDeque<QuestEvent>,
}

impl Migrate for EventLogState {
    const VERSION: u32 = 1;

    fn migrate(state: Value, _from_version: u32) -> Result<Self, QuestError> {
        Ok(serde_json::from_value(state)?)
    }
}

struct LogInner {
    state: RefCell<EventLogState>,
    capacity: usize,
    slot: PersistedSlot<EventLogState>,
    wiring: RefCell<Option<Subscription>>,
}

impl LogInner {
    fn append(&self, event: QuestEvent) {
        let mut state = self.state.borrow_mut();
        state.events.push_back(event);
        let overflow = state.events.len().saturating_sub(self.capacity);
        if overflow > 0 {
            state.events.drain(..overflow);
            debug!(evicted = overflow, "event log at capacity");
        }
        self.slot.save(&state);
    }
}

/// Capped event history. Cloning shares the same log.
#[derive(Clone)]
pub struct EventLogStore {
    inner: Rc<LogInner>,
}

impl std::fmt::Debug for EventLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogStore")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .field("wired", &self.is_logging())
            .finish()
    }
}

impl EventLogStore {
    /// Open the log, restoring any persisted history
    pub fn open(kv: Rc<dyn KvStore>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slot = PersistedSlot::new(EVENT_LOG_KEY, kv);
        let mut state: EventLogState = slot.load().unwrap_or_default();
        let overflow = state.events.len().saturating_sub(capacity);
        state.events.drain(..overflow);
        debug!(events = state.events.len(), "event log opened");

        Self {
            inner: Rc::new(LogInner {
                state: RefCell::new(state),
                capacity,
                slot,
                wiring: RefCell::new(None),
            }),
        }
    }

    /// Append one event, evicting the oldest beyond capacity
    pub fn add_event(&self, event: QuestEvent) {
        self.inner.append(event);
    }

    /// Replace the whole log with `events`. No merge with prior history;
    /// only the newest `capacity` entries are kept.
    pub fn reset(&self, events: Vec<QuestEvent>) {
        let mut events = VecDeque::from(events);
        let overflow = events.len().saturating_sub(self.inner.capacity);
        events.drain(..overflow);

        let mut state = self.inner.state.borrow_mut();
        info!(replaced = state.events.len(), events = events.len(), "event log reset");
        state.events = events;
        self.inner.slot.save(&state);
    }

    pub fn clear(&self) {
        self.reset(Vec::new());
    }

    /// All retained events, oldest first
    pub fn events(&self) -> Vec<QuestEvent> {
        self.inner.state.borrow().events.iter().cloned().collect()
    }

    pub fn get_events_by_quest(&self, quest_id: &str) -> Vec<QuestEvent> {
        self.inner
            .state
            .borrow()
            .events
            .iter()
            .filter(|e| e.quest_id == quest_id)
            .cloned()
            .collect()
    }

    pub fn get_events_by_type(&self, kind: QuestEventType) -> Vec<QuestEvent> {
        self.inner
            .state
            .borrow()
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Subscribe the log to every event on `bus`.
    ///
    /// Calling this again while wired returns the existing handle.
    pub fn setup_quest_event_logging(&self, bus: &EventBus) -> Subscription {
        let mut wiring = self.inner.wiring.borrow_mut();
        if let Some(existing) = wiring.as_ref().filter(|sub| sub.is_active()) {
            return existing.clone();
        }

        let log: Weak<LogInner> = Rc::downgrade(&self.inner);
        let subscription = bus.subscribe_fn(move |event| {
            if let Some(log) = log.upgrade() {
                log.append(event.clone());
            }
            Ok(())
        });
        debug!(subscription = subscription.id(), "event logging wired");
        *wiring = Some(subscription.clone());
        subscription
    }

    /// Remove the bus wiring. Returns `false` if it was not wired.
    pub fn teardown_quest_event_logging(&self) -> bool {
        match self.inner.wiring.borrow_mut().take() {
            Some(subscription) => subscription.unsubscribe(),
            None => false,
        }
    }

    pub fn is_logging(&self) -> bool {
        self.inner
            .wiring
            .borrow()
            .as_ref()
            .map_or(false, Subscription::is_active)
    }

    pub fn flush(&self) -> Result<(), QuestError> {
        self.inner.slot.flush()
    }
}
