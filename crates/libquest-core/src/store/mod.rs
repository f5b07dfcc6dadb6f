use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{snapshot_to_event, snapshot_to_quest_events, SnapshotSource};
use crate::bus::EventBus;
use crate::clock::Clock;
use crate::error::QuestError;
use crate::kv::KvStore;
use crate::log::EventLogStore;
use crate::persist::{Migrate, PersistedSlot};
use crate::types::event::QuestEvent;
use crate::types::ids::{steps, QuestId};
use crate::types::quest::{ActiveQuest, BatchUpdate, QuestProgressState, QuestSnapshot};

/// Storage key owned by the quest store
pub const QUEST_PROGRESS_KEY: &str = "quest-progress";

impl Migrate for QuestProgressState {
    const VERSION: u32 = 1;

    fn migrate(state: Value, _from_version: u32) -> Result<Self, QuestError> {
        Ok(serde_json::from_value(state)?)
    }
}

/// Callback invoked with the new state after every committed mutation
pub type ChangeListener = Rc<dyn Fn(&QuestProgressState)>;

/// Identifier returned by [`QuestStore::on_change`]
pub type ListenerId = u64;

/// Outcome of a [`QuestStore::hydrate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HydrateReport {
    pub snapshot_count: usize,
    pub events_logged: usize,
    pub active_count: usize,
    pub completed_count: usize,
    pub tracked_quest_id: Option<QuestId>,
}

/// The single mutable source of UI-visible quest state.
///
/// Every action reads the latest committed state, mutates it in place,
/// persists it, publishes the resulting events, and then notifies change
/// listeners. No action fails: unknown quest ids are no-ops or permissive
/// completions.
pub struct QuestStore {
    state: RefCell<QuestProgressState>,
    bus: EventBus,
    log: EventLogStore,
    slot: PersistedSlot<QuestProgressState>,
    clock: Rc<dyn Clock>,
    listeners: RefCell<Vec<(ListenerId, ChangeListener)>>,
    next_listener: Cell<ListenerId>,
}

impl std::fmt::Debug for QuestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestStore")
            .field("state", &self.state.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl QuestStore {
    /// Open the store, restoring persisted progress
    pub fn open(kv: Rc<dyn KvStore>, bus: EventBus, log: EventLogStore, clock: Rc<dyn Clock>) -> Self {
        let slot = PersistedSlot::new(QUEST_PROGRESS_KEY, kv);
        let mut state: QuestProgressState = slot.load().unwrap_or_default();

        let overlapping: Vec<QuestId> = state.overlapping_ids().into_iter().cloned().collect();
        if !overlapping.is_empty() {
            warn!(quests = ?overlapping, "persisted quests both active and completed; keeping them active");
            state
                .completed_quests
                .retain(|id| !overlapping.contains(id));
        }

        debug!(
            active = state.active_quests.len(),
            completed = state.completed_quests.len(),
            "quest store opened"
        );

        Self {
            state: RefCell::new(state),
            bus,
            log,
            slot,
            clock,
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        }
    }

    /// Run a mutation against the latest state and persist it. `None` from
    /// the closure means nothing changed and nothing is written. The borrow
    /// is released before returning, so the caller may publish and notify.
    fn transact<R>(&self, f: impl FnOnce(&mut QuestProgressState) -> Option<R>) -> Option<R> {
        let mut state = self.state.borrow_mut();
        let result = f(&mut state)?;
        self.slot.save(&state);
        Some(result)
    }

    fn notify(&self) {
        let listeners: Vec<ChangeListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.state.borrow().clone();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Start (or restart) a quest at `step`. Always publishes
    /// `quest.started`, even if the quest was already active at that step.
    pub fn start_quest(&self, quest_id: &str, step: &str) -> QuestEvent {
        let now = self.clock.now_ms();
        let event = self.transact(|state| {
            state.unmark_completed(quest_id);
            state
                .active_quests
                .insert(quest_id.to_string(), ActiveQuest::new(quest_id, step, now));
            if state.tracked_quest_id.is_none() {
                state.tracked_quest_id = Some(quest_id.to_string());
            }
            Some(QuestEvent::started(quest_id, step))
        });
        let event = event.unwrap_or_else(|| QuestEvent::started(quest_id, step));
        let event = self.bus.publish(event);
        self.notify();
        event
    }

    /// Move an active quest to `step`. Returns `None` without publishing if
    /// the quest is not active or already at `step`.
    pub fn advance_quest(&self, quest_id: &str, step: &str) -> Option<QuestEvent> {
        let event = self.transact(|state| {
            let quest = state.active_quests.get_mut(quest_id)?;
            if quest.current_step == step {
                return None;
            }
            let from = std::mem::replace(&mut quest.current_step, step.to_string());
            Some(QuestEvent::advanced(quest_id, from, step))
        });
        match event {
            Some(event) => {
                let event = self.bus.publish(event);
                self.notify();
                Some(event)
            }
            None => {
                debug!(quest_id, step, "advance ignored");
                None
            }
        }
    }

    /// Retire a quest into the completed set. Quests that were not active
    /// are still recorded as completed, reported with step `completed`.
    pub fn complete_quest(&self, quest_id: &str) -> QuestEvent {
        let event = self.transact(|state| {
            let last_step = state
                .active_quests
                .shift_remove(quest_id)
                .map(|q| q.current_step);
            state.mark_completed(quest_id);
            if state.tracked_quest_id.as_deref() == Some(quest_id) {
                state.tracked_quest_id = state.first_active_id().cloned();
            }
            let step = last_step.unwrap_or_else(|| steps::COMPLETED.to_string());
            Some(QuestEvent::completed(quest_id, step))
        });
        let event = event.unwrap_or_else(|| QuestEvent::completed(quest_id, steps::COMPLETED));
        let event = self.bus.publish(event);
        self.notify();
        event
    }

    /// Apply a reconciliation batch as one transition.
    ///
    /// The batch is first collapsed to one entry per quest (see
    /// [`collapse_batch`]). Completions only announce quests that were
    /// active; step updates announce a start, an advance, or nothing.
    /// Applying the same batch twice leaves the state and the bus untouched
    /// the second time.
    pub fn apply_batch(&self, updates: &[BatchUpdate]) -> Vec<QuestEvent> {
        let now = self.clock.now_ms();
        let entries = collapse_batch(updates);
        let events = self.transact(|state| {
            let mut events = Vec::new();
            let mut changed = false;
            let mut tracked_completed = false;

            for (quest_id, entry) in &entries {
                let quest_id = *quest_id;
                match *entry {
                    BatchEntry::Complete(completed_at) => {
                        if let Some(quest) = state.active_quests.shift_remove(quest_id) {
                            changed = true;
                            events.push(
                                QuestEvent::completed(quest_id, quest.current_step)
                                    .with_timestamp(completed_at),
                            );
                        }
                        changed |= state.mark_completed(quest_id);
                        if state.tracked_quest_id.as_deref() == Some(quest_id) {
                            tracked_completed = true;
                        }
                    }
                    BatchEntry::Step(step) => match state.active_quests.get_mut(quest_id) {
                        None => {
                            state.unmark_completed(quest_id);
                            state
                                .active_quests
                                .insert(quest_id.to_string(), ActiveQuest::new(quest_id, step, now));
                            if state.tracked_quest_id.is_none() {
                                state.tracked_quest_id = Some(quest_id.to_string());
                            }
                            changed = true;
                            events.push(QuestEvent::started(quest_id, step));
                        }
                        Some(quest) if quest.current_step != step => {
                            let from = std::mem::replace(&mut quest.current_step, step.to_string());
                            changed = true;
                            events.push(QuestEvent::advanced(quest_id, from, step));
                        }
                        Some(_) => {}
                    },
                }
            }

            if tracked_completed {
                let successor = state.first_active_id().cloned();
                if state.tracked_quest_id != successor {
                    state.tracked_quest_id = successor;
                    changed = true;
                }
            }

            changed.then_some(events)
        });

        let Some(events) = events else {
            debug!(updates = updates.len(), "batch changed nothing");
            return Vec::new();
        };
        debug!(updates = updates.len(), events = events.len(), "batch applied");
        let events: Vec<QuestEvent> = events.into_iter().map(|e| self.bus.publish(e)).collect();
        self.notify();
        events
    }

    /// Reconcile against authoritative snapshots.
    ///
    /// The event log is replaced by the snapshot-derived events, and the
    /// canonical state is rebuilt by walking `snapshots` in order. Local
    /// history is discarded; nothing is published.
    pub fn hydrate(&self, snapshots: &[QuestSnapshot]) -> HydrateReport {
        let events = snapshot_to_quest_events(snapshots, SnapshotSource::Server);
        self.log.reset(events);
        let events_logged = self.log.len();

        self.transact(|state| {
            *state = rebuild_from_snapshots(state, snapshots);
            Some(())
        });
        self.notify();
        let report = self.with_state(|state| HydrateReport {
            snapshot_count: snapshots.len(),
            events_logged,
            active_count: state.active_quests.len(),
            completed_count: state.completed_quests.len(),
            tracked_quest_id: state.tracked_quest_id.clone(),
        });
        info!(
            snapshots = report.snapshot_count,
            active = report.active_count,
            completed = report.completed_count,
            "hydrated from snapshots"
        );
        report
    }

    /// Set the tracked quest without checking that it is active
    pub fn set_tracked_quest(&self, quest_id: Option<&str>) {
        self.transact(|state| {
            state.tracked_quest_id = quest_id.map(str::to_string);
            Some(())
        });
        self.notify();
    }

    /// Register a listener for committed mutations.
    ///
    /// Listeners run after the mutation's events have been published, with
    /// the state as it is at that moment. A listener may call back into the
    /// store; the events it causes are logged after the ones that woke it.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QuestProgressState) + 'static,
    {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Copy of the current state
    pub fn state(&self) -> QuestProgressState {
        self.state.borrow().clone()
    }

    /// Read the current state without copying it
    pub fn with_state<R>(&self, f: impl FnOnce(&QuestProgressState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn active_quests(&self) -> IndexMap<QuestId, ActiveQuest> {
        self.state.borrow().active_quests.clone()
    }

    /// Alias of [`QuestStore::active_quests`]
    pub fn quests(&self) -> IndexMap<QuestId, ActiveQuest> {
        self.active_quests()
    }

    pub fn completed_quests(&self) -> Vec<QuestId> {
        self.state.borrow().completed_quests.clone()
    }

    pub fn tracked_quest_id(&self) -> Option<QuestId> {
        self.state.borrow().tracked_quest_id.clone()
    }

    pub fn is_active(&self, quest_id: &str) -> bool {
        self.state.borrow().is_active(quest_id)
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.state.borrow().is_completed(quest_id)
    }

    pub fn current_step(&self, quest_id: &str) -> Option<String> {
        self.state.borrow().current_step(quest_id).map(str::to_string)
    }

    pub fn flush(&self) -> Result<(), QuestError> {
        self.slot.flush()
    }
}

/// Net effect of a batch on one quest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEntry<'a> {
    /// Completed at this time
    Complete(u64),
    /// Moved to this step
    Step(&'a str),
}

/// Collapse a batch to one entry per quest, keyed in first-appearance
/// order. A completion anywhere in the batch wins over steps (the first
/// completion time is kept); otherwise the last step wins. Entries with
/// neither field are ignored.
pub fn collapse_batch(updates: &[BatchUpdate]) -> IndexMap<&str, BatchEntry<'_>> {
    let mut entries: IndexMap<&str, BatchEntry<'_>> = IndexMap::new();
    for update in updates {
        let next = match (update.completed_at, update.current_step.as_deref()) {
            (Some(at), _) => BatchEntry::Complete(at),
            (None, Some(step)) => BatchEntry::Step(step),
            (None, None) => continue,
        };
        match entries.get_mut(update.quest_id.as_str()) {
            Some(BatchEntry::Complete(_)) => {}
            Some(existing) => *existing = next,
            None => {
                entries.insert(update.quest_id.as_str(), next);
            }
        }
    }
    entries
}

/// Rebuild canonical state by walking `snapshots` in order.
///
/// A completed snapshot retires the quest; a later started snapshot for
/// the same quest does not revive it. When an id appears in several
/// started snapshots, the one with the latest synthetic timestamp wins
/// (the later snapshot on a tie), which is the entry the projection of the
/// hydrated log keeps. `started_at` is kept from `prior` for quests that
/// were already active, otherwise taken from the synthetic event timestamp.
/// Tracking survives if its quest is still active.
pub fn rebuild_from_snapshots(
    prior: &QuestProgressState,
    snapshots: &[QuestSnapshot],
) -> QuestProgressState {
    let mut active: IndexMap<QuestId, ActiveQuest> = IndexMap::with_capacity(snapshots.len());
    let mut sort_keys: HashMap<&str, u64> = HashMap::with_capacity(snapshots.len());
    let mut completed: Vec<QuestId> = Vec::new();

    for snapshot in snapshots {
        if snapshot.completed_at.is_some() {
            active.shift_remove(&snapshot.id);
            if !completed.contains(&snapshot.id) {
                completed.push(snapshot.id.clone());
            }
            continue;
        }
        if snapshot.current_step == steps::NOT_STARTED || completed.contains(&snapshot.id) {
            continue;
        }

        let synthetic = snapshot_to_event(snapshot, SnapshotSource::Server)
            .and_then(|e| e.timestamp)
            .unwrap_or_default();
        if sort_keys
            .get(snapshot.id.as_str())
            .is_some_and(|&kept| kept > synthetic)
        {
            continue;
        }
        sort_keys.insert(snapshot.id.as_str(), synthetic);

        let started_at = prior
            .active_quests
            .get(&snapshot.id)
            .map(|q| q.started_at)
            .unwrap_or(synthetic);
        active.insert(
            snapshot.id.clone(),
            ActiveQuest::new(snapshot.id.clone(), snapshot.current_step.clone(), started_at),
        );
    }

    let mut state = QuestProgressState {
        active_quests: active,
        completed_quests: completed,
        tracked_quest_id: prior.tracked_quest_id.clone(),
    };
    state.retarget_tracking();
    state
}
