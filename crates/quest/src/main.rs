mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use libquest_core::QuestError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run_command(&cli) {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_command(cli: &Cli) -> Result<(), QuestError> {
    match &cli.command {
        Command::Start { id, step } => commands::actions::run_start(cli, id, step),
        Command::Advance { id, step } => commands::actions::run_advance(cli, id, step),
        Command::Complete { id } => commands::actions::run_complete(cli, id),
        Command::Track { id, clear } => commands::actions::run_track(cli, id.as_deref(), *clear),
        Command::Status => commands::status::run(cli),
        Command::Batch { file } => commands::sync::run_batch(cli, file),
        Command::Hydrate { file } => commands::sync::run_hydrate(cli, file),
        Command::Log { quest, kind, limit } => {
            commands::log::run(cli, quest.as_deref(), kind.map(Into::into), *limit)
        }
        Command::LogClear => commands::log::run_clear(cli),
        Command::Project => commands::project::run(cli),
        Command::Doctor => commands::doctor::run(cli),
        Command::Config {
            set_player,
            log_capacity,
            flush_every_ms,
        } => commands::config::run(cli, set_player.clone(), *log_capacity, *flush_every_ms),
    }
}
