use thiserror::Error;

/// Main error type for quest ledger operations
#[derive(Debug, Error)]
pub enum QuestError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported schema for '{slot}': version {version}")]
    UnsupportedSchema { slot: String, version: u32 },

    #[error("event handler failed: {0}")]
    Handler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QuestError {
    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            QuestError::InvalidArgs(_) => "invalid_args",
            QuestError::NotFound(_) => "not_found",
            QuestError::UnsupportedSchema { .. } => "unsupported_schema",
            QuestError::Handler(_) => "handler_error",
            QuestError::Io(_) => "io_error",
            QuestError::Sled(_) => "db_error",
            QuestError::Json(_) => "invalid_json",
            QuestError::TomlParse(_) => "invalid_args",
            QuestError::TomlSerialize(_) => "internal_error",
            QuestError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            QuestError::InvalidArgs(_) => 2,
            QuestError::TomlParse(_) => 2,
            QuestError::Json(_) => 2,
            QuestError::NotFound(_) => 3,
            QuestError::UnsupportedSchema { .. } => 4,
            QuestError::Io(_) => 5,
            QuestError::Sled(_) => 5,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            QuestError::Sled(_) => vec![
                "Check that no other process has the ledger open",
                "If problem persists, check disk space and permissions",
            ],
            QuestError::Json(_) => vec![
                "Snapshot files must be a JSON array of {\"id\", \"currentStep\", \"completedAt\"} objects",
            ],
            QuestError::TomlParse(_) => vec!["Run 'quest config' to print a valid configuration"],
            QuestError::UnsupportedSchema { .. } => vec![
                "The ledger was written by a newer version of quest",
            ],
            QuestError::NotFound(msg) if msg.contains("quest") => {
                vec!["Run 'quest status' to see active and completed quests"]
            }
            _ => vec![],
        }
    }

    /// Create a NotFound error for a quest id
    pub fn quest_not_found(quest_id: &str) -> Self {
        QuestError::NotFound(format!("quest '{}' is not active", quest_id))
    }
}
