//! Store actions: start, advance, complete, track

use libquest_core::{QuestError, QuestEvent};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::QuestContext;
use crate::output::output;

#[derive(Serialize)]
struct EventOutput {
    event: QuestEvent,
    tracked_quest_id: Option<String>,
}

#[derive(Serialize)]
struct AdvanceOutput {
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<QuestEvent>,
}

#[derive(Serialize)]
struct TrackOutput {
    tracked_quest_id: Option<String>,
    active: bool,
}

pub fn run_start(cli: &Cli, id: &str, step: &str) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    let event = ledger.store().start_quest(id, step);
    let tracked_quest_id = ledger.store().tracked_quest_id();
    ledger.flush()?;

    output(cli, EventOutput { event, tracked_quest_id }, |o| {
        format!("Started {} at '{}'", o.event.quest_id, o.event.step.as_deref().unwrap_or(""))
    })
}

pub fn run_advance(cli: &Cli, id: &str, step: &str) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    let event = ledger.store().advance_quest(id, step);
    ledger.flush()?;

    output(
        cli,
        AdvanceOutput {
            changed: event.is_some(),
            event,
        },
        |o| match &o.event {
            Some(e) => format!(
                "Advanced {}: {} -> {}",
                e.quest_id,
                e.from.as_deref().unwrap_or(""),
                e.to.as_deref().unwrap_or("")
            ),
            None => format!("No change: {} is not active or already at '{}'", id, step),
        },
    )
}

pub fn run_complete(cli: &Cli, id: &str) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    let event = ledger.store().complete_quest(id);
    let tracked_quest_id = ledger.store().tracked_quest_id();
    ledger.flush()?;

    output(cli, EventOutput { event, tracked_quest_id }, |o| {
        let mut text = format!(
            "Completed {} (last step '{}')",
            o.event.quest_id,
            o.event.step.as_deref().unwrap_or("")
        );
        if let Some(next) = &o.tracked_quest_id {
            text.push_str(&format!("\nNow tracking {}", next));
        }
        text
    })
}

pub fn run_track(cli: &Cli, id: Option<&str>, clear: bool) -> Result<(), QuestError> {
    if id.is_none() && !clear {
        return Err(QuestError::InvalidArgs(
            "pass a quest ID to track, or --clear".to_string(),
        ));
    }

    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    ledger.store().set_tracked_quest(id);
    ledger.flush()?;

    let active = id.map_or(false, |id| ledger.store().is_active(id));
    output(
        cli,
        TrackOutput {
            tracked_quest_id: id.map(str::to_string),
            active,
        },
        |o| match &o.tracked_quest_id {
            Some(id) if o.active => format!("Tracking {}", id),
            Some(id) => format!("Tracking {} (not currently active)", id),
            None => "Tracking cleared".to_string(),
        },
    )
}
