use libquest_core::{ProjectedQuestState, QuestError};

use crate::cli::Cli;
use crate::context::QuestContext;
use crate::output::output;

pub fn run(cli: &Cli) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let ledger = ctx.open_ledger()?;

    output(cli, ledger.project(), render)
}

fn render(projected: &ProjectedQuestState) -> String {
    let mut lines = Vec::new();
    for (id, quest) in &projected.active_quests {
        lines.push(format!("active    {} @ {}", id, quest.current_step));
    }
    for id in &projected.completed_quests {
        lines.push(format!("completed {}", id));
    }
    if lines.is_empty() {
        lines.push("Projection is empty".to_string());
    }
    lines.join("\n")
}
