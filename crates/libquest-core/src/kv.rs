//! Durable key-value medium behind the persisted slots.
//!
//! The medium is a scoped byte store with get/set/remove. Each player gets
//! its own scope (a sled tree), and each component owns exactly one key in
//! it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::QuestError;

/// Default sled background flush interval
pub const DEFAULT_FLUSH_EVERY_MS: u64 = 500;

/// Scoped byte store
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, QuestError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), QuestError>;
    fn remove(&self, key: &str) -> Result<(), QuestError>;

    /// Force buffered writes to durable storage
    fn flush(&self) -> Result<(), QuestError> {
        Ok(())
    }
}

/// sled-backed store; one tree per scope.
///
/// Writes land in sled's page cache and are flushed in the background
/// every `flush_every_ms`, so callers never wait on the disk.
pub struct SledKv {
    db: sled::Db,
    tree: sled::Tree,
}

impl std::fmt::Debug for SledKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledKv")
            .field("tree", &String::from_utf8_lossy(&self.tree.name()))
            .finish()
    }
}

impl SledKv {
    /// Open or create the database at `path` and select `scope`
    pub fn open(path: &Path, scope: &str, flush_every_ms: Option<u64>) -> Result<Self, QuestError> {
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(flush_every_ms)
            .open()?;
        Self::from_db(db, scope)
    }

    /// Select `scope` inside an already-open database
    pub fn from_db(db: sled::Db, scope: &str) -> Result<Self, QuestError> {
        let tree = db.open_tree(scope_tree_name(scope))?;
        Ok(Self { db, tree })
    }

    /// Scopes that hold data in this database
    pub fn list_scopes(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .filter_map(|name| {
                std::str::from_utf8(&name)
                    .ok()
                    .and_then(|s| s.strip_prefix(SCOPE_PREFIX))
                    .map(str::to_string)
            })
            .collect()
    }
}

const SCOPE_PREFIX: &str = "scope/";

fn scope_tree_name(scope: &str) -> String {
    format!("{}{}", SCOPE_PREFIX, scope)
}

impl KvStore for SledKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, QuestError> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), QuestError> {
        self.tree.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), QuestError> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), QuestError> {
        self.tree.flush()?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, QuestError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), QuestError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), QuestError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Degraded medium: reads are empty, writes are discarded
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKv;

impl KvStore for NoopKv {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, QuestError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &[u8]) -> Result<(), QuestError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), QuestError> {
        Ok(())
    }
}
