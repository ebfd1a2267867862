//! `run` and `validate`: replay or parse scenario scripts

use std::fs;

use serde::Serialize;
use tabled::Tabled;
use tracing::info;
use vault_engine::LedgerConfig;

use crate::error::{CliError, CliResult};
use crate::output::{self, OutputFormat};
use crate::script::{Scenario, ScenarioReport, ScenarioRunner};

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    op: &'static str,
    caller: String,
    height: u64,
    outcome: String,
}

#[derive(Debug, Serialize, Tabled)]
struct BalanceRow {
    account: String,
    balance: u64,
}

fn step_rows(report: &ScenarioReport) -> Vec<StepRow> {
    report
        .steps
        .iter()
        .map(|step| StepRow {
            index: step.index,
            op: step.op,
            caller: step.caller.clone(),
            height: step.height,
            outcome: match &step.error {
                Some(err) => format!("rejected: {}", err),
                None => "ok".to_string(),
            },
        })
        .collect()
}

fn balance_rows(report: &ScenarioReport) -> Vec<BalanceRow> {
    report
        .balances
        .iter()
        .map(|(account, balance)| BalanceRow {
            account: account.clone(),
            balance: *balance,
        })
        .collect()
}

fn load(path: &str) -> CliResult<Scenario> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })?;
    Scenario::from_yaml(&text)
}

pub fn execute(path: &str, config: LedgerConfig, format: OutputFormat) -> CliResult<()> {
    let scenario = load(path)?;
    info!(path, steps = scenario.steps.len(), "Running scenario");

    let report = ScenarioRunner::new(config).run(scenario)?;

    if matches!(format, OutputFormat::Table) {
        output::print_output(step_rows(&report), format)?;
        output::print_output(balance_rows(&report), format)?;
        output::print_info(&format!(
            "{} vaults, {} events",
            report.vaults.len(),
            report.events.len()
        ));
        return Ok(());
    }

    output::print_single(&report, format)
}

pub fn validate(path: &str) -> CliResult<()> {
    let scenario = load(path)?;
    output::print_success(&format!("{}: {} steps", path, scenario.steps.len()));
    Ok(())
}
