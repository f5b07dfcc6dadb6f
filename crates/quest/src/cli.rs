use clap::{Parser, Subcommand, ValueEnum};
use libquest_core::QuestEventType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quest", about = "On-device quest progression ledger", version)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Override the data directory (default: $QUEST_DATA_DIR, then ./.quest)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the player scope
    #[arg(long, global = true)]
    pub player: Option<String>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start or restart a quest
    Start {
        /// Quest ID
        id: String,

        /// Initial step
        #[arg(long, default_value = "started")]
        step: String,
    },

    /// Move an active quest to a new step
    Advance {
        /// Quest ID
        id: String,

        /// Target step
        step: String,
    },

    /// Mark a quest completed
    Complete {
        /// Quest ID
        id: String,
    },

    /// Set or clear the tracked quest
    Track {
        /// Quest ID to track
        #[arg(conflicts_with = "clear")]
        id: Option<String>,

        /// Stop tracking any quest
        #[arg(long)]
        clear: bool,
    },

    /// Show active, completed, and tracked quests
    Status,

    /// Apply a reconciliation batch from a JSON file
    Batch {
        /// JSON array of {questId, currentStep?, completedAt?}
        file: PathBuf,
    },

    /// Replace local state with authoritative snapshots from a JSON file
    Hydrate {
        /// JSON array of {id, currentStep, completedAt?}
        file: PathBuf,
    },

    /// Show the event log
    Log {
        /// Only events for this quest
        #[arg(long)]
        quest: Option<String>,

        /// Only events of this type
        #[arg(long = "type", value_enum)]
        kind: Option<EventTypeArg>,

        /// Show at most the newest N events
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Empty the event log
    LogClear,

    /// Fold the event log into the projected read model
    Project,

    /// Run health checks on the ledger
    Doctor,

    /// Show or update the ledger configuration
    Config {
        /// Set the default player scope
        #[arg(long = "set-player")]
        set_player: Option<String>,

        /// Set the event log capacity
        #[arg(long)]
        log_capacity: Option<usize>,

        /// Set the background flush interval (0 disables)
        #[arg(long)]
        flush_every_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EventTypeArg {
    Started,
    Advanced,
    Completed,
}

impl From<EventTypeArg> for QuestEventType {
    fn from(arg: EventTypeArg) -> Self {
        match arg {
            EventTypeArg::Started => QuestEventType::Started,
            EventTypeArg::Advanced => QuestEventType::Advanced,
            EventTypeArg::Completed => QuestEventType::Completed,
        }
    }
}
