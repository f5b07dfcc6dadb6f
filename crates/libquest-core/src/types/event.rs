use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{QuestId, QuestStep};

/// Free-form event context (`source`, `createdAt`, ...)
pub type EventContext = serde_json::Map<String, Value>;

/// Kind of quest transition an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestEventType {
    #[serde(rename = "quest.started")]
    Started,
    #[serde(rename = "quest.advanced")]
    Advanced,
    #[serde(rename = "quest.completed")]
    Completed,
}

impl QuestEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestEventType::Started => "quest.started",
            QuestEventType::Advanced => "quest.advanced",
            QuestEventType::Completed => "quest.completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quest.started" | "started" => Some(QuestEventType::Started),
            "quest.advanced" | "advanced" => Some(QuestEventType::Advanced),
            "quest.completed" | "completed" => Some(QuestEventType::Completed),
            _ => None,
        }
    }

    /// Ordering priority for events sharing a timestamp:
    /// started before advanced before completed.
    pub fn priority(&self) -> u8 {
        match self {
            QuestEventType::Started => 0,
            QuestEventType::Advanced => 1,
            QuestEventType::Completed => 2,
        }
    }
}

/// A domain event describing one quest transition.
///
/// Events are immutable once published; the bus only fills in a missing
/// timestamp before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestEvent {
    #[serde(rename = "type")]
    pub kind: QuestEventType,
    pub quest_id: QuestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<QuestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<QuestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<QuestStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<EventContext>,
    /// Milliseconds since Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl QuestEvent {
    fn bare(kind: QuestEventType, quest_id: impl Into<QuestId>) -> Self {
        Self {
            kind,
            quest_id: quest_id.into(),
            step: None,
            from: None,
            to: None,
            context: None,
            timestamp: None,
        }
    }

    /// A quest entered `step` from nothing
    pub fn started(quest_id: impl Into<QuestId>, step: impl Into<QuestStep>) -> Self {
        let step = step.into();
        Self {
            to: Some(step.clone()),
            step: Some(step),
            ..Self::bare(QuestEventType::Started, quest_id)
        }
    }

    /// An active quest moved from one step to another
    pub fn advanced(
        quest_id: impl Into<QuestId>,
        from: impl Into<QuestStep>,
        to: impl Into<QuestStep>,
    ) -> Self {
        let to = to.into();
        Self {
            step: Some(to.clone()),
            from: Some(from.into()),
            to: Some(to),
            ..Self::bare(QuestEventType::Advanced, quest_id)
        }
    }

    /// A quest was retired, `step` being the last known step
    pub fn completed(quest_id: impl Into<QuestId>, step: impl Into<QuestStep>) -> Self {
        Self {
            step: Some(step.into()),
            ..Self::bare(QuestEventType::Completed, quest_id)
        }
    }

    pub fn with_timestamp(mut self, ts_unix_ms: u64) -> Self {
        self.timestamp = Some(ts_unix_ms);
        self
    }

    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Set a single context entry, creating the context if needed
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(EventContext::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up a context entry
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }
}
