use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ids::{QuestId, QuestStep};

/// A quest the player is currently progressing through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuest {
    pub id: QuestId,
    pub current_step: QuestStep,
    /// Milliseconds since Unix epoch
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl ActiveQuest {
    pub fn new(id: impl Into<QuestId>, current_step: impl Into<QuestStep>, started_at: u64) -> Self {
        Self {
            id: id.into(),
            current_step: current_step.into(),
            started_at,
            completed_at: None,
        }
    }
}

/// Authoritative progress record returned by the quest service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestSnapshot {
    pub id: QuestId,
    pub current_step: QuestStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl QuestSnapshot {
    pub fn new(id: impl Into<QuestId>, current_step: impl Into<QuestStep>) -> Self {
        Self {
            id: id.into(),
            current_step: current_step.into(),
            completed_at: None,
        }
    }

    pub fn completed(id: impl Into<QuestId>, current_step: impl Into<QuestStep>, completed_at: u64) -> Self {
        Self {
            completed_at: Some(completed_at),
            ..Self::new(id, current_step)
        }
    }
}

/// One entry of a reconciliation batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdate {
    #[serde(alias = "id")]
    pub quest_id: QuestId,
    #[serde(default, alias = "step", skip_serializing_if = "Option::is_none")]
    pub current_step: Option<QuestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl BatchUpdate {
    pub fn step(quest_id: impl Into<QuestId>, step: impl Into<QuestStep>) -> Self {
        Self {
            quest_id: quest_id.into(),
            current_step: Some(step.into()),
            completed_at: None,
        }
    }

    pub fn completion(quest_id: impl Into<QuestId>, completed_at: u64) -> Self {
        Self {
            quest_id: quest_id.into(),
            current_step: None,
            completed_at: Some(completed_at),
        }
    }
}

/// Canonical quest progress for one player.
///
/// `active_quests` is insertion-ordered: when the tracked quest completes,
/// its successor is the first remaining entry. Entries must only ever be
/// removed with `shift_remove` so that order survives removals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestProgressState {
    #[serde(default)]
    pub active_quests: IndexMap<QuestId, ActiveQuest>,
    #[serde(default)]
    pub completed_quests: Vec<QuestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_quest_id: Option<QuestId>,
}

impl QuestProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only alias of `active_quests`
    pub fn quests(&self) -> &IndexMap<QuestId, ActiveQuest> {
        &self.active_quests
    }

    pub fn is_active(&self, quest_id: &str) -> bool {
        self.active_quests.contains_key(quest_id)
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.completed_quests.iter().any(|id| id == quest_id)
    }

    /// Current step of an active quest
    pub fn current_step(&self, quest_id: &str) -> Option<&str> {
        self.active_quests
            .get(quest_id)
            .map(|q| q.current_step.as_str())
    }

    /// First active quest by insertion order
    pub fn first_active_id(&self) -> Option<&QuestId> {
        self.active_quests.keys().next()
    }

    /// Append to `completed_quests` unless already present. Returns `true`
    /// if the id was added.
    pub(crate) fn mark_completed(&mut self, quest_id: &str) -> bool {
        if self.is_completed(quest_id) {
            return false;
        }
        self.completed_quests.push(quest_id.to_string());
        true
    }

    pub(crate) fn unmark_completed(&mut self, quest_id: &str) {
        self.completed_quests.retain(|id| id != quest_id);
    }

    /// Point tracking at the first active quest if the tracked quest is no
    /// longer active
    pub(crate) fn retarget_tracking(&mut self) {
        let still_active = self
            .tracked_quest_id
            .as_deref()
            .map_or(false, |id| self.is_active(id));
        if !still_active {
            self.tracked_quest_id = self.first_active_id().cloned();
        }
    }

    /// Quest ids present in both collections. Always empty for states
    /// produced by the store.
    pub fn overlapping_ids(&self) -> Vec<&QuestId> {
        self.completed_quests
            .iter()
            .filter(|id| self.active_quests.contains_key(id.as_str()))
            .collect()
    }
}
