use std::path::{Path, PathBuf};

use libquest_core::config::{load_ledger_config, LedgerConfig};
use libquest_core::{QuestError, QuestLedger};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cli::Cli;

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "QUEST_DATA_DIR";

/// Data directory used when neither flag nor environment names one
pub const DEFAULT_DATA_DIR: &str = ".quest";

/// Where the data directory came from
#[derive(Debug, Clone, Copy)]
pub enum DataDirSource {
    Flag,
    Env,
    Default,
}

impl DataDirSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataDirSource::Flag => "flag",
            DataDirSource::Env => "env",
            DataDirSource::Default => "default",
        }
    }
}

/// Resolved context for a quest command
pub struct QuestContext {
    pub data_dir: PathBuf,
    pub source: DataDirSource,
    pub config: LedgerConfig,
    /// Whether `config.toml` existed
    pub config_found: bool,
}

impl QuestContext {
    /// Resolve data directory and configuration from flags, environment and
    /// `config.toml`
    pub fn resolve(cli: &Cli) -> Result<Self, QuestError> {
        let (data_dir, source) = match (&cli.data_dir, std::env::var_os(DATA_DIR_ENV)) {
            (Some(dir), _) => (dir.clone(), DataDirSource::Flag),
            (None, Some(dir)) if !dir.is_empty() => (PathBuf::from(dir), DataDirSource::Env),
            _ => (PathBuf::from(DEFAULT_DATA_DIR), DataDirSource::Default),
        };

        let loaded = load_ledger_config(&data_dir)?;
        let config_found = loaded.is_some();
        let mut config = loaded.unwrap_or_default();
        if let Some(player) = &cli.player {
            config.player = player.clone();
        }
        config.validate()?;

        debug!(
            data_dir = %data_dir.display(),
            source = source.as_str(),
            player = %config.player,
            "context resolved"
        );

        Ok(Self {
            data_dir,
            source,
            config,
            config_found,
        })
    }

    pub fn open_ledger(&self) -> Result<QuestLedger, QuestError> {
        QuestLedger::open(&self.data_dir, &self.config)
    }
}

/// Read and decode a JSON input file
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, QuestError> {
    if !path.exists() {
        return Err(QuestError::NotFound(format!("input file {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
