//! Composition root: one bus, one log, one store per player.

use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::bus::EventBus;
use crate::clock::{Clock, SystemClock};
use crate::config::{ledger_sled_path, LedgerConfig};
use crate::consistency::{check_log_agreement, ConsistencyReport};
use crate::error::QuestError;
use crate::kv::{KvStore, MemoryKv, SledKv};
use crate::log::{EventLogStore, DEFAULT_LOG_CAPACITY};
use crate::projection::{project_quest_state, ProjectedQuestState};
use crate::store::QuestStore;

/// A wired quest ledger.
///
/// Construction order matters: the log subscribes to the bus before the
/// store exists, so no event published by the store can go unlogged.
#[derive(Debug)]
pub struct QuestLedger {
    bus: EventBus,
    log: EventLogStore,
    store: QuestStore,
}

impl QuestLedger {
    /// Open the sled-backed ledger in `data_dir` for the configured player
    pub fn open(data_dir: &Path, config: &LedgerConfig) -> Result<Self, QuestError> {
        config.validate()?;
        std::fs::create_dir_all(data_dir)?;
        let kv = SledKv::open(&ledger_sled_path(data_dir), &config.player, config.flush_interval())?;
        debug!(player = %config.player, path = %data_dir.display(), "ledger opened");
        Ok(Self::with_parts(Rc::new(kv), Rc::new(SystemClock), config.log_capacity))
    }

    /// Ephemeral ledger; nothing survives the process
    pub fn in_memory() -> Self {
        Self::with_parts(Rc::new(MemoryKv::new()), Rc::new(SystemClock), DEFAULT_LOG_CAPACITY)
    }

    /// Wire a ledger over an arbitrary medium and clock
    pub fn with_parts(kv: Rc<dyn KvStore>, clock: Rc<dyn Clock>, log_capacity: usize) -> Self {
        let bus = EventBus::new(Rc::clone(&clock));
        let log = EventLogStore::open(Rc::clone(&kv), log_capacity);
        log.setup_quest_event_logging(&bus);
        let store = QuestStore::open(kv, bus.clone(), log.clone(), clock);
        Self { bus, log, store }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn log(&self) -> &EventLogStore {
        &self.log
    }

    pub fn store(&self) -> &QuestStore {
        &self.store
    }

    /// Project the current event log
    pub fn project(&self) -> ProjectedQuestState {
        project_quest_state(&self.log.events())
    }

    /// Compare canonical state with a projection of the event log
    pub fn check_consistency(&self) -> ConsistencyReport {
        self.store
            .with_state(|state| check_log_agreement(state, &self.log.events()))
    }

    /// Force pending writes to disk
    pub fn flush(&self) -> Result<(), QuestError> {
        self.store.flush()?;
        self.log.flush()
    }
}
