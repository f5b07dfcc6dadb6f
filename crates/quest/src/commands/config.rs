use libquest_core::config::{config_path, save_ledger_config, LedgerConfig};
use libquest_core::QuestError;
use serde::Serialize;

use crate::cli::Cli;
use crate::context::QuestContext;
use crate::output::output;

#[derive(Serialize)]
struct ConfigOutput {
    path: String,
    data_dir_source: &'static str,
    saved: bool,
    config: LedgerConfig,
}

pub fn run(
    cli: &Cli,
    set_player: Option<String>,
    log_capacity: Option<usize>,
    flush_every_ms: Option<u64>,
) -> Result<(), QuestError> {
    let ctx = QuestContext::resolve(cli)?;
    let mut config = ctx.config.clone();

    let changed = set_player.is_some() || log_capacity.is_some() || flush_every_ms.is_some();
    if let Some(player) = set_player {
        config.player = player;
    }
    if let Some(capacity) = log_capacity {
        config.log_capacity = capacity;
    }
    if let Some(ms) = flush_every_ms {
        config.flush_every_ms = ms;
    }

    if changed {
        config.validate()?;
        save_ledger_config(&ctx.data_dir, &config)?;
    }

    output(
        cli,
        ConfigOutput {
            path: config_path(&ctx.data_dir).display().to_string(),
            data_dir_source: ctx.source.as_str(),
            saved: changed,
            config,
        },
        |o| {
            let mut lines = vec![
                format!("player = \"{}\"", o.config.player),
                format!("log_capacity = {}", o.config.log_capacity),
                format!("flush_every_ms = {}", o.config.flush_every_ms),
            ];
            if o.saved {
                lines.push(format!("Saved to {}", o.path));
            }
            lines.join("\n")
        },
    )
}
