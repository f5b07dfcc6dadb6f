//! Versioned JSON slots on top of a [`KvStore`].
//!
//! Each slot is one key holding `{"version": N, "state": ...}`. Loading an
//! older version runs the type's [`Migrate`] hook. Every failure degrades:
//! unreadable or future-versioned data loads as empty, and failed writes
//! are logged and dropped. The in-memory state stays authoritative.

use std::marker::PhantomData;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::QuestError;
use crate::kv::KvStore;

/// A type stored in a versioned slot
pub trait Migrate: Serialize + DeserializeOwned {
    /// Version written by this build
    const VERSION: u32;

    /// Upgrade a state written at `from_version` (< `VERSION`)
    fn migrate(state: Value, from_version: u32) -> Result<Self, QuestError>;
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    version: u32,
    state: &'a T,
}

#[derive(Deserialize)]
struct VersionTag {
    version: u32,
}

// Current-version slots decode straight into `T`. Going through `Value`
// would sort object keys and lose `IndexMap` order.
#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Envelope<T> {
    state: T,
}

#[derive(Deserialize)]
struct LegacyEnvelope {
    state: Value,
}

/// One versioned key owned by one component
pub struct PersistedSlot<T> {
    key: &'static str,
    kv: Rc<dyn KvStore>,
    _marker: PhantomData<T>,
}

impl<T> std::fmt::Debug for PersistedSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedSlot").field("key", &self.key).finish()
    }
}

impl<T: Migrate> PersistedSlot<T> {
    pub fn new(key: &'static str, kv: Rc<dyn KvStore>) -> Self {
        Self {
            key,
            kv,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Read and decode the slot, surfacing every failure
    pub fn try_load(&self) -> Result<Option<T>, QuestError> {
        let Some(bytes) = self.kv.get(self.key)? else {
            return Ok(None);
        };
        let VersionTag { version } = serde_json::from_slice(&bytes)?;

        if version == T::VERSION {
            let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
            return Ok(Some(envelope.state));
        }
        if version > T::VERSION {
            return Err(QuestError::UnsupportedSchema {
                slot: self.key.to_string(),
                version,
            });
        }

        debug!(slot = self.key, from = version, to = T::VERSION, "migrating slot");
        let envelope: LegacyEnvelope = serde_json::from_slice(&bytes)?;
        T::migrate(envelope.state, version).map(Some)
    }

    /// Read the slot; any failure is logged and treated as empty
    pub fn load(&self) -> Option<T> {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!(slot = self.key, "discarding unreadable persisted state: {}", e);
                None
            }
        }
    }

    /// Encode and write the slot, surfacing every failure
    pub fn try_save(&self, state: &T) -> Result<(), QuestError> {
        let bytes = serde_json::to_vec(&EnvelopeOut {
            version: T::VERSION,
            state,
        })?;
        self.kv.set(self.key, &bytes)
    }

    /// Write the slot; a failure is logged and the write dropped
    pub fn save(&self, state: &T) {
        if let Err(e) = self.try_save(state) {
            warn!(slot = self.key, "persist failed, continuing in memory: {}", e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(self.key) {
            warn!(slot = self.key, "failed to clear persisted state: {}", e);
        }
    }

    pub fn flush(&self) -> Result<(), QuestError> {
        self.kv.flush()
    }
}
