//! Conversion of authoritative snapshots into synthetic quest events.

use serde::{Deserialize, Serialize};

use crate::hash::resolve_started_at;
use crate::types::event::QuestEvent;
use crate::types::ids::steps;
use crate::types::quest::QuestSnapshot;

/// Origin of a synthetic event, recorded as `context.source`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Server,
    Local,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Server => "server",
            SnapshotSource::Local => "local",
        }
    }
}

/// Convert one snapshot into at most one event.
///
/// - `completed_at` set: `quest.completed` stamped with that time
/// - otherwise, step other than `not_started`: `quest.started` stamped via
///   [`resolve_started_at`]
/// - otherwise: nothing
pub fn snapshot_to_event(snapshot: &QuestSnapshot, source: SnapshotSource) -> Option<QuestEvent> {
    if let Some(completed_at) = snapshot.completed_at {
        let event = QuestEvent::completed(snapshot.id.clone(), snapshot.current_step.clone())
            .with_context_entry("source", source.as_str())
            .with_timestamp(completed_at);
        return Some(event);
    }

    if snapshot.current_step == steps::NOT_STARTED {
        return None;
    }

    let event = QuestEvent::started(snapshot.id.clone(), snapshot.current_step.clone())
        .with_context_entry("source", source.as_str());
    let started_at = resolve_started_at(&event);
    Some(event.with_timestamp(started_at))
}

/// Convert snapshots into synthetic events, preserving input order.
///
/// The output is not chronological; run it through
/// [`crate::projection::sort_events`] when order matters.
pub fn snapshot_to_quest_events(snapshots: &[QuestSnapshot], source: SnapshotSource) -> Vec<QuestEvent> {
    snapshots
        .iter()
        .filter_map(|snapshot| snapshot_to_event(snapshot, source))
        .collect()
}
