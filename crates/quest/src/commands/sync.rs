//! Server reconciliation: batch updates and full hydrate

use std::path::Path;

use libquest_core::store::HydrateReport;
use libquest_core::{BatchUpdate, QuestError, QuestEvent, QuestSnapshot};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::{read_json_file, QuestContext};
use crate::output::output;

#[derive(Serialize)]
struct BatchOutput {
    updates: usize,
    events: Vec<QuestEvent>,
}

pub fn run_batch(cli: &Cli, file: &Path) -> Result<(), QuestError> {
    let updates: Vec<BatchUpdate> = read_json_file(file)?;
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    let events = ledger.store().apply_batch(&updates);
    ledger.flush()?;

    output(
        cli,
        BatchOutput {
            updates: updates.len(),
            events,
        },
        |o| {
            if o.events.is_empty() {
                return format!("Applied {} updates: no changes", o.updates);
            }
            let mut lines = vec![format!("Applied {} updates:", o.updates)];
            for e in &o.events {
                lines.push(format!("  {} {}", e.kind.as_str(), e.quest_id));
            }
            lines.join("\n")
        },
    )
}

pub fn run_hydrate(cli: &Cli, file: &Path) -> Result<(), QuestError> {
    let snapshots: Vec<QuestSnapshot> = read_json_file(file)?;
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    let report: HydrateReport = ledger.store().hydrate(&snapshots);
    ledger.flush()?;

    output(cli, report, |r| {
        format!(
            "Hydrated {} snapshots: {} active, {} completed, {} events logged",
            r.snapshot_count, r.active_count, r.completed_count, r.events_logged
        )
    })
}
