use comfy_table::{presets::UTF8_FULL, Table};
use libquest_core::{QuestError, QuestEvent, QuestEventType};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::QuestContext;
use crate::output::{format_ms, output};

#[derive(Serialize)]
struct LogOutput {
    total: usize,
    capacity: usize,
    events: Vec<QuestEvent>,
}

#[derive(Serialize)]
struct ClearOutput {
    cleared: usize,
}

pub fn run(
    cli: &Cli,
    quest: Option<&str>,
    kind: Option<QuestEventType>,
    limit: Option<usize>,
) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;
    let log = ledger.log();

    let mut events = match quest {
        Some(id) => log.get_events_by_quest(id),
        None => log.events(),
    };
    if let Some(kind) = kind {
        events.retain(|e| e.kind == kind);
    }
    if let Some(limit) = limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }

    output(
        cli,
        LogOutput {
            total: log.len(),
            capacity: log.capacity(),
            events,
        },
        render,
    )
}

fn render(out: &LogOutput) -> String {
    if out.events.is_empty() {
        return "No events".to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["TIME", "TYPE", "QUEST", "STEP", "SOURCE"]);
    for event in &out.events {
        let step = match (&event.from, &event.to) {
            (Some(from), Some(to)) => format!("{} -> {}", from, to),
            _ => event.step.clone().unwrap_or_default(),
        };
        let source = event
            .context_value("source")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        table.add_row(vec![
            event.timestamp.map(format_ms).unwrap_or_default(),
            event.kind.as_str().to_string(),
            event.quest_id.clone(),
            step,
            source,
        ]);
    }
    format!("{}\n{} of {} events (capacity {})", table, out.events.len(), out.total, out.capacity)
}

pub fn run_clear(cli: &Cli) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    let cleared = ledger.log().len();
    ledger.log().clear();
    ledger.flush()?;

    output(cli, ClearOutput { cleared }, |o| {
        format!("Cleared {} events", o.cleared)
    })
}
