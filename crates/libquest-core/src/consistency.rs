//! Agreement checks between canonical state and the projected read model.
//!
//! Hydrate rebuilds canonical state by walking snapshots directly, while
//! the projection folds the snapshot-derived events in chronological
//! order. The two paths are expected to agree on which quests are active
//! (and at which step) and which are completed. Completed order is not
//! compared: the walk keeps snapshot order, the projection keeps time
//! order.

use std::collections::HashSet;

use serde::Serialize;

use crate::adapter::{snapshot_to_quest_events, SnapshotSource};
use crate::projection::{project_quest_state, ProjectedQuestState};
use crate::store::rebuild_from_snapshots;
use crate::types::event::QuestEvent;
use crate::types::ids::{QuestId, QuestStep};
use crate::types::quest::{QuestProgressState, QuestSnapshot};

/// Result of an agreement check
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConsistencyReport {
    /// Events folded into the projection
    pub events_checked: usize,
    /// Quests compared across both sides
    pub quests_checked: usize,
    /// Every disagreement found
    pub drift: Vec<Drift>,
}

/// One quest on which the two sides disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub quest_id: QuestId,
    #[serde(flatten)]
    pub kind: DriftKind,
}

/// Kinds of disagreement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftKind {
    /// Active in canonical state, not in the projection
    ActiveOnlyInState,
    /// Active in the projection, not in canonical state
    ActiveOnlyInProjection,
    /// Active on both sides at different steps
    StepMismatch {
        state_step: QuestStep,
        projected_step: QuestStep,
    },
    /// Completed in canonical state only
    CompletedOnlyInState,
    /// Completed in the projection only
    CompletedOnlyInProjection,
}

impl ConsistencyReport {
    /// Check if both sides agree
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty()
    }

    pub fn drift_count(&self) -> usize {
        self.drift.len()
    }
}

/// Compare canonical state with a projection of `events_checked` events
pub fn compare_with_projection(
    state: &QuestProgressState,
    projected: &ProjectedQuestState,
    events_checked: usize,
) -> ConsistencyReport {
    let mut report = ConsistencyReport {
        events_checked,
        ..Default::default()
    };
    let mut seen: HashSet<&str> = HashSet::new();

    for (id, quest) in &state.active_quests {
        seen.insert(id.as_str());
        match projected.active_quests.get(id) {
            None => report.drift.push(Drift {
                quest_id: id.clone(),
                kind: DriftKind::ActiveOnlyInState,
            }),
            Some(p) if p.current_step != quest.current_step => report.drift.push(Drift {
                quest_id: id.clone(),
                kind: DriftKind::StepMismatch {
                    state_step: quest.current_step.clone(),
                    projected_step: p.current_step.clone(),
                },
            }),
            Some(_) => {}
        }
    }
    for id in projected.active_quests.keys() {
        seen.insert(id.as_str());
        if !state.active_quests.contains_key(id) {
            report.drift.push(Drift {
                quest_id: id.clone(),
                kind: DriftKind::ActiveOnlyInProjection,
            });
        }
    }

    for id in &state.completed_quests {
        seen.insert(id.as_str());
        if !projected.is_completed(id) {
            report.drift.push(Drift {
                quest_id: id.clone(),
                kind: DriftKind::CompletedOnlyInState,
            });
        }
    }
    for id in &projected.completed_quests {
        seen.insert(id.as_str());
        if !state.is_completed(id) {
            report.drift.push(Drift {
                quest_id: id.clone(),
                kind: DriftKind::CompletedOnlyInProjection,
            });
        }
    }

    report.quests_checked = seen.len();
    report
}

/// Check that hydrating from `snapshots` and projecting their synthetic
/// events produce the same quest sets
pub fn check_hydrate_agreement(snapshots: &[QuestSnapshot]) -> ConsistencyReport {
    let state = rebuild_from_snapshots(&QuestProgressState::default(), snapshots);
    let events = snapshot_to_quest_events(snapshots, SnapshotSource::Server);
    let projected = project_quest_state(&events);
    compare_with_projection(&state, &projected, events.len())
}

/// Check canonical state against a projection of an event log
pub fn check_log_agreement(state: &QuestProgressState, events: &[QuestEvent]) -> ConsistencyReport {
    let projected = project_quest_state(events);
    compare_with_projection(state, &projected, events.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::quest::ActiveQuest;

    #[test]
    fn test_report_is_consistent() {
        let report = ConsistencyReport::default();
        assert!(report.is_consistent());

        let mut with_drift = ConsistencyReport::default();
        with_drift.drift.push(Drift {
            quest_id: "q1".to_string(),
            kind: DriftKind::ActiveOnlyInState,
        });
        assert!(!with_drift.is_consistent());
        assert_eq!(with_drift.drift_count(), 1);
    }

    #[test]
    fn test_hydrate_agreement_on_mixed_snapshots() {
        let report = check_hydrate_agreement(&[
            QuestSnapshot::new("q3", "research"),
            QuestSnapshot::completed("q4", "completed", 1000),
            QuestSnapshot::new("q5", "not_started"),
            QuestSnapshot::completed("q1", "research", 5),
            QuestSnapshot::new("q2", "exploration"),
        ]);
        assert!(report.is_consistent(), "{:?}", report.drift);
        assert_eq!(report.events_checked, 4);
        assert_eq!(report.quests_checked, 4);
    }

    #[test]
    fn test_completed_then_restarted_snapshot_agrees() {
        let report = check_hydrate_agreement(&[
            QuestSnapshot::completed("q1", "completed", 10),
            QuestSnapshot::new("q1", "research"),
        ]);
        assert!(report.is_consistent(), "{:?}", report.drift);
    }

    #[test]
    fn test_detects_each_drift_kind() {
        let mut state = QuestProgressState::default();
        state
            .active_quests
            .insert("a".to_string(), ActiveQuest::new("a", "research", 1));
        state
            .active_quests
            .insert("b".to_string(), ActiveQuest::new("b", "started", 1));
        state.completed_quests.push("c".to_string());

        let events = vec![
            QuestEvent::started("b", "exploration").with_timestamp(1),
            QuestEvent::started("d", "started").with_timestamp(2),
            QuestEvent::completed("e", "completed").with_timestamp(3),
        ];
        let report = check_log_agreement(&state, &events);

        let kinds: Vec<_> = report
            .drift
            .iter()
            .map(|d| (d.quest_id.as_str(), d.kind.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", DriftKind::ActiveOnlyInState),
                (
                    "b",
                    DriftKind::StepMismatch {
                        state_step: "started".to_string(),
                        projected_step: "exploration".to_string(),
                    }
                ),
                ("d", DriftKind::ActiveOnlyInProjection),
                ("c", DriftKind::CompletedOnlyInState),
                ("e", DriftKind::CompletedOnlyInProjection),
            ]
        );
        assert_eq!(report.quests_checked, 5);
    }

    #[test]
    fn test_completed_order_is_ignored() {
        let mut state = QuestProgressState::default();
        state.completed_quests = vec!["late".to_string(), "early".to_string()];
        let events = vec![
            QuestEvent::completed("early", "completed").with_timestamp(1),
            QuestEvent::completed("late", "completed").with_timestamp(2),
        ];
        assert!(check_log_agreement(&state, &events).is_consistent());
    }
}
