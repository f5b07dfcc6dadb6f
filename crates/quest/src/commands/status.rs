use comfy_table::{presets::UTF8_FULL, Table};
use libquest_core::{QuestError, QuestProgressState};

use crate::cli::Cli;
use crate::context::QuestContext;
use crate::output::{format_ms, output};

pub fn run(cli: &Cli) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;
    let state = ledger.store().state();

    output(cli, state, render)
}

fn render(state: &QuestProgressState) -> String {
    let mut lines = Vec::new();

    if state.active_quests.is_empty() {
        lines.push("No active quests".to_string());
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["", "QUEST", "STEP", "STARTED"]);
        for quest in state.active_quests.values() {
            let marker = if state.tracked_quest_id.as_deref() == Some(quest.id.as_str()) {
                "*"
            } else {
                ""
            };
            table.add_row(vec![
                marker.to_string(),
                quest.id.clone(),
                quest.current_step.clone(),
                format_ms(quest.started_at),
            ]);
        }
        lines.push(table.to_string());
    }

    if !state.completed_quests.is_empty() {
        lines.push(format!("Completed: {}", state.completed_quests.join(", ")));
    }
    if let Some(tracked) = &state.tracked_quest_id {
        if !state.is_active(tracked) {
            lines.push(format!("Tracking {} (not currently active)", tracked));
        }
    }

    lines.join("\n")
}
