//! Pure fold from an event log to the active/completed read model.
//!
//! Events are first put in a total order by `(timestamp, priority, index)`
//! and then applied one by one. The same input always yields the same
//! output, including the order of `completed_quests`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::{numeric_created_at, resolve_started_at};
use crate::types::event::{QuestEvent, QuestEventType};
use crate::types::ids::{QuestId, QuestStep};

/// Sort position for events with no usable time: after every timed event
pub const UNTIMED_SENTINEL: i64 = i64::MAX;

/// Projected view of one active quest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedQuest {
    pub current_step: QuestStep,
    pub started_at: u64,
}

/// Read model produced by folding an event log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedQuestState {
    pub active_quests: IndexMap<QuestId, ProjectedQuest>,
    pub completed_quests: Vec<QuestId>,
}

/// Total ordering key of an event within a log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub timestamp: i64,
    pub priority: u8,
    pub index: usize,
}

impl SortKey {
    pub fn for_event(event: &QuestEvent, index: usize) -> Self {
        Self {
            timestamp: sortable_timestamp(event),
            priority: event.kind.priority(),
            index,
        }
    }
}

impl ProjectedQuestState {
    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.completed_quests.iter().any(|id| id == quest_id)
    }

    /// Apply one event, in log order
    pub fn apply(&mut self, event: &QuestEvent) {
        let quest_id = event.quest_id.as_str();

        match event.kind {
            QuestEventType::Started => {
                if self.is_completed(quest_id) {
                    return;
                }
                let step = event.step.clone().unwrap_or_default();
                self.active_quests.insert(
                    event.quest_id.clone(),
                    ProjectedQuest {
                        current_step: step,
                        started_at: resolve_started_at(event),
                    },
                );
            }

            QuestEventType::Advanced => {
                if self.is_completed(quest_id) {
                    return;
                }
                let Some(quest) = self.active_quests.get_mut(quest_id) else {
                    return;
                };
                if let Some(step) = event.to.as_ref().or(event.step.as_ref()) {
                    quest.current_step = step.clone();
                }
            }

            QuestEventType::Completed => {
                self.active_quests.shift_remove(quest_id);
                if !self.is_completed(quest_id) {
                    self.completed_quests.push(event.quest_id.clone());
                }
            }
        }
    }
}

/// Time used to order an event: its timestamp, else a numeric
/// `context.createdAt`, else a date string in `context.createdAt`, else
/// [`UNTIMED_SENTINEL`].
pub fn sortable_timestamp(event: &QuestEvent) -> i64 {
    if let Some(ts) = event.timestamp {
        return i64::try_from(ts).unwrap_or(UNTIMED_SENTINEL - 1);
    }
    if let Some(created) = numeric_created_at(event) {
        return i64::try_from(created).unwrap_or(UNTIMED_SENTINEL - 1);
    }
    match event.context_value("createdAt") {
        Some(Value::String(s)) => parse_date_ms(s).unwrap_or(UNTIMED_SENTINEL),
        _ => UNTIMED_SENTINEL,
    }
}

/// Parse a date string into milliseconds since Unix epoch.
///
/// Accepts RFC 3339, RFC 2822, naive `YYYY-MM-DD[ T]HH:MM:SS[.fff]` (read
/// as UTC) and bare `YYYY-MM-DD`.
pub fn parse_date_ms(input: &str) -> Option<i64> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive).timestamp_millis())
}

/// Order events by `(timestamp, priority, original index)`
pub fn sort_events(events: &[QuestEvent]) -> Vec<&QuestEvent> {
    let mut keyed: Vec<(SortKey, &QuestEvent)> = events
        .iter()
        .enumerate()
        .map(|(index, event)| (SortKey::for_event(event, index), event))
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, event)| event).collect()
}

/// Fold an event sequence into the active/completed read model
pub fn project_quest_state(events: &[QuestEvent]) -> ProjectedQuestState {
    let mut state = ProjectedQuestState::default();
    for event in sort_events(events) {
        state.apply(event);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::event_content_hash;

    #[test]
    fn test_start_advance_complete() {
        let events = vec![
            QuestEvent::started("q1", "started").with_timestamp(1000),
            QuestEvent::advanced("q1", "started", "research").with_timestamp(2000),
        ];
        let state = project_quest_state(&events);
        assert_eq!(state.active_quests["q1"].current_step, "research");
        assert_eq!(state.active_quests["q1"].started_at, 1000);

        let mut events = events;
        events.push(QuestEvent::completed("q1", "research").with_timestamp(3000));
        let state = project_quest_state(&events);
        assert!(state.active_quests.is_empty());
        assert_eq!(state.completed_quests, vec!["q1"]);
    }

    #[test]
    fn test_sort_by_timestamp_not_arrival() {
        // Completion arrives first but happened last
        let events = vec![
            QuestEvent::completed("q1", "research").with_timestamp(3000),
            QuestEvent::advanced("q1", "started", "research").with_timestamp(2000),
            QuestEvent::started("q1", "started").with_timestamp(1000),
        ];
        let state = project_quest_state(&events);
        assert!(state.active_quests.is_empty());
        assert_eq!(state.completed_quests, vec!["q1"]);
    }

    #[test]
    fn test_priority_breaks_timestamp_ties() {
        let events = vec![
            QuestEvent::completed("q1", "research").with_timestamp(500),
            QuestEvent::advanced("q1", "started", "research").with_timestamp(500),
            QuestEvent::started("q1", "started").with_timestamp(500),
        ];
        let sorted: Vec<_> = sort_events(&events).into_iter().map(|e| e.kind).collect();
        assert_eq!(
            sorted,
            vec![
                QuestEventType::Started,
                QuestEventType::Advanced,
                QuestEventType::Completed
            ]
        );
        assert_eq!(project_quest_state(&events).completed_quests, vec!["q1"]);
    }

    #[test]
    fn test_index_breaks_full_ties() {
        let events = vec![
            QuestEvent::started("b", "started").with_timestamp(1),
            QuestEvent::started("a", "started").with_timestamp(1),
        ];
        let state = project_quest_state(&events);
        let keys: Vec<_> = state.active_quests.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_untimed_events_sort_last() {
        let untimed = QuestEvent::started("q1", "exploration");
        let timed = QuestEvent::started("q1", "started").with_timestamp(10);
        let state = project_quest_state(&[untimed.clone(), timed]);
        // The untimed start is applied last and overwrites
        assert_eq!(state.active_quests["q1"].current_step, "exploration");
        assert_eq!(
            state.active_quests["q1"].started_at,
            u64::from(event_content_hash(&untimed))
        );
    }

    #[test]
    fn test_created_at_ordering() {
        let events = vec![
            QuestEvent::advanced("q1", "started", "research")
                .with_context_entry("createdAt", "2024-01-02T00:00:00Z"),
            QuestEvent::started("q1", "started").with_context_entry("createdAt", "2024-01-01"),
        ];
        let state = project_quest_state(&events);
        assert_eq!(state.active_quests["q1"].current_step, "research");

        let numeric = QuestEvent::started("q2", "started").with_context_entry("createdAt", 7);
        assert_eq!(sortable_timestamp(&numeric), 7);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date_ms("1970-01-01T00:00:01Z"), Some(1000));
        assert_eq!(parse_date_ms("1970-01-01T00:00:01.500+00:00"), Some(1500));
        assert_eq!(parse_date_ms("1970-01-02"), Some(86_400_000));
        assert_eq!(parse_date_ms("1970-01-01 00:01:00"), Some(60_000));
        assert_eq!(parse_date_ms("Thu, 01 Jan 1970 00:00:02 +0000"), Some(2000));
        assert_eq!(parse_date_ms("yesterday"), None);
    }

    #[test]
    fn test_advance_on_unknown_quest_dropped() {
        let events = vec![QuestEvent::advanced("ghost", "started", "research").with_timestamp(1)];
        let state = project_quest_state(&events);
        assert!(state.active_quests.is_empty());
        assert!(state.completed_quests.is_empty());
    }

    #[test]
    fn test_start_after_completion_skipped() {
        let events = vec![
            QuestEvent::started("q1", "started").with_timestamp(1),
            QuestEvent::completed("q1", "started").with_timestamp(2),
            QuestEvent::started("q1", "started").with_timestamp(3),
            QuestEvent::advanced("q1", "started", "research").with_timestamp(4),
        ];
        let state = project_quest_state(&events);
        assert!(state.active_quests.is_empty());
        assert_eq!(state.completed_quests, vec!["q1"]);
    }

    #[test]
    fn test_completed_without_start_recorded_once() {
        let events = vec![
            QuestEvent::completed("q1", "completed").with_timestamp(1),
            QuestEvent::completed("q1", "completed").with_timestamp(2),
        ];
        assert_eq!(project_quest_state(&events).completed_quests, vec!["q1"]);
    }

    #[test]
    fn test_deterministic_output() {
        let events = vec![
            QuestEvent::started("q1", "started"),
            QuestEvent::started("q2", "research").with_context_entry("source", "server"),
            QuestEvent::completed("q3", "completed").with_timestamp(1000),
            QuestEvent::completed("q4", "completed").with_timestamp(1000),
        ];
        let first = serde_json::to_string(&project_quest_state(&events)).unwrap();
        let second = serde_json::to_string(&project_quest_state(&events)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            project_quest_state(&events).completed_quests,
            vec!["q3", "q4"]
        );
    }
}
