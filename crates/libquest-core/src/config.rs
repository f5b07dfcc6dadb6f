use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::QuestError;
use crate::kv::DEFAULT_FLUSH_EVERY_MS;
use crate::log::DEFAULT_LOG_CAPACITY;

/// Player scope used when none is configured
pub const DEFAULT_PLAYER: &str = "default";

/// Ledger configuration stored in `<data_dir>/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Storage scope; each player gets isolated progress and history
    pub player: String,
    /// Maximum events kept in the event log
    pub log_capacity: usize,
    /// sled background flush interval; 0 disables background flushing
    pub flush_every_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            player: DEFAULT_PLAYER.to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            flush_every_ms: DEFAULT_FLUSH_EVERY_MS,
        }
    }
}

impl LedgerConfig {
    /// Flush interval in the form sled expects
    pub fn flush_interval(&self) -> Option<u64> {
        (self.flush_every_ms > 0).then_some(self.flush_every_ms)
    }

    /// Reject values the ledger cannot run with
    pub fn validate(&self) -> Result<(), QuestError> {
        if self.player.trim().is_empty() {
            return Err(QuestError::InvalidArgs("player must not be empty".to_string()));
        }
        if self.log_capacity == 0 {
            return Err(QuestError::InvalidArgs("log_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Path of the config file inside a data directory
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Path of the sled database inside a data directory
pub fn ledger_sled_path(data_dir: &Path) -> PathBuf {
    data_dir.join("sled")
}

/// Load config from `<data_dir>/config.toml`
pub fn load_ledger_config(data_dir: &Path) -> Result<Option<LedgerConfig>, QuestError> {
    let path = config_path(data_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let config: LedgerConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save config to `<data_dir>/config.toml`
pub fn save_ledger_config(data_dir: &Path, config: &LedgerConfig) -> Result<(), QuestError> {
    std::fs::create_dir_all(data_dir)?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(config_path(data_dir), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(load_ledger_config(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config = LedgerConfig {
            player: "alice".to_string(),
            log_capacity: 50,
            flush_every_ms: 0,
        };
        save_ledger_config(dir.path(), &config).unwrap();
        let loaded = load_ledger_config(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.flush_interval(), None);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(config_path(dir.path()), "player = \"bob\"\n").unwrap();
        let config = load_ledger_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.player, "bob");
        assert_eq!(config.log_capacity, DEFAULT_LOG_CAPACITY);
        assert_eq!(config.flush_interval(), Some(DEFAULT_FLUSH_EVERY_MS));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(config_path(dir.path()), "player = [").unwrap();
        let err = load_ledger_config(dir.path()).unwrap_err();
        assert_eq!(err.error_code(), "invalid_args");
    }

    #[test]
    fn test_validate() {
        assert!(LedgerConfig::default().validate().is_ok());
        let config = LedgerConfig {
            log_capacity: 0,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
