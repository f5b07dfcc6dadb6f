//! Doctor command - health checks for a player's ledger

use libquest_core::consistency::{ConsistencyReport, DriftKind};
use libquest_core::{QuestError, QuestLedger};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::QuestContext;
use crate::output::output;

#[derive(Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistency: Option<ConsistencyReport>,
}

#[derive(Serialize)]
struct CheckResult {
    id: String,
    status: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    plan: Vec<String>,
}

impl CheckResult {
    fn ok(id: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "ok".to_string(),
            message: message.to_string(),
            plan: vec![],
        }
    }

    fn warn(id: &str, message: &str, plan: Vec<&str>) -> Self {
        Self {
            id: id.to_string(),
            status: "warn".to_string(),
            message: message.to_string(),
            plan: plan.into_iter().map(String::from).collect(),
        }
    }

    fn error(id: &str, message: &str, plan: Vec<&str>) -> Self {
        Self {
            id: id.to_string(),
            status: "error".to_string(),
            message: message.to_string(),
            plan: plan.into_iter().map(String::from).collect(),
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), QuestError> {
    let mut checks = Vec::new();
    let mut consistency = None;

    match QuestContext::resolve(cli) {
        Ok(ctx) => {
            checks.push(if ctx.config_found {
                CheckResult::ok("config", "config.toml is valid")
            } else {
                CheckResult::ok("config", "No config.toml, using defaults")
            });

            match ctx.open_ledger() {
                Ok(ledger) => {
                    checks.push(CheckResult::ok(
                        "storage",
                        &format!("Opened player '{}'", ctx.config.player),
                    ));
                    checks.push(check_tracking(&ledger));
                    checks.push(check_log_capacity(&ledger));
                    let report = ledger.check_consistency();
                    checks.push(check_consistency(&report));
                    consistency = Some(report);
                }
                Err(e) => checks.push(CheckResult::error(
                    "storage",
                    &e.to_string(),
                    e.suggestions(),
                )),
            }
        }
        Err(e) => checks.push(CheckResult::error("config", &e.to_string(), e.suggestions())),
    }

    let has_errors = checks.iter().any(|c| c.status == "error");

    output(cli, DoctorOutput { checks, consistency }, |o| {
        let mut lines = Vec::new();
        for check in &o.checks {
            let icon = match check.status.as_str() {
                "ok" => "[ok]",
                "warn" => "[!!]",
                "error" => "[ERR]",
                _ => "[?]",
            };
            lines.push(format!("{} {}: {}", icon, check.id, check.message));
            for plan_item in &check.plan {
                lines.push(format!("     -> {}", plan_item));
            }
        }
        lines.join("\n")
    })?;

    if has_errors {
        return Err(QuestError::Internal("Health checks failed".to_string()));
    }
    Ok(())
}

fn check_tracking(ledger: &QuestLedger) -> CheckResult {
    let state = ledger.store().state();
    if !state.overlapping_ids().is_empty() {
        return CheckResult::error(
            "state",
            "Quests are both active and completed",
            vec!["Run 'quest hydrate <snapshots.json>' to rebuild from the server"],
        );
    }
    match &state.tracked_quest_id {
        Some(id) if !state.is_active(id) => CheckResult::warn(
            "state",
            &format!("Tracked quest {} is not active", id),
            vec!["Run 'quest track <id>' or 'quest track --clear'"],
        ),
        _ => CheckResult::ok(
            "state",
            &format!(
                "{} active, {} completed",
                state.active_quests.len(),
                state.completed_quests.len()
            ),
        ),
    }
}

fn check_log_capacity(ledger: &QuestLedger) -> CheckResult {
    let log = ledger.log();
    if log.len() >= log.capacity() {
        CheckResult::warn(
            "event_log",
            &format!("Event log is full ({} events); oldest entries are being evicted", log.len()),
            vec!["Projection may disagree with state once history is evicted"],
        )
    } else {
        CheckResult::ok(
            "event_log",
            &format!("{} of {} events", log.len(), log.capacity()),
        )
    }
}

fn check_consistency(report: &ConsistencyReport) -> CheckResult {
    if report.is_consistent() {
        return CheckResult::ok(
            "consistency",
            &format!(
                "Projection of {} events agrees with state on {} quests",
                report.events_checked, report.quests_checked
            ),
        );
    }

    let restarted = report
        .drift
        .iter()
        .any(|d| matches!(d.kind, DriftKind::ActiveOnlyInState));
    let mut plan = vec!["Run 'quest hydrate <snapshots.json>' to reconcile from the server"];
    if restarted {
        plan.push("Restarted or evicted quests appear only in state; this is expected after a restart");
    }
    CheckResult::warn(
        "consistency",
        &format!("{} quests differ between state and projection", report.drift_count()),
        plan,
    )
}
