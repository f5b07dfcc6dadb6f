pub mod types;
pub mod error;
pub mod clock;
pub mod hash;
pub mod adapter;
pub mod projection;
pub mod bus;
pub mod kv;
pub mod persist;
pub mod log;
pub mod store;
pub mod consistency;
pub mod config;
pub mod ledger;

pub use error::QuestError;
pub use types::{QuestId, QuestStep, EventContext};
pub use types::event::{QuestEvent, QuestEventType};
pub use types::quest::{ActiveQuest, BatchUpdate, QuestProgressState, QuestSnapshot};
pub use types::ids::steps;
pub use clock::{Clock, ManualClock, SystemClock};
pub use bus::{EventBus, EventHandler, HandlerResult, Subscription};
pub use kv::{KvStore, MemoryKv, NoopKv, SledKv};
pub use log::EventLogStore;
pub use store::{HydrateReport, QuestStore};
pub use projection::{project_quest_state, sort_events, ProjectedQuestState};
pub use adapter::{snapshot_to_quest_events, SnapshotSource};
pub use consistency::{check_hydrate_agreement, ConsistencyReport};
pub use config::{LedgerConfig, load_ledger_config, save_ledger_config};
pub use ledger::QuestLedger;
