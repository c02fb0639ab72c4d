//! `relic run`: execute the routine against simulated hardware.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use relic_core::types::PhaseOutcome;
use relic_runtime::{load_scenario, LogFormat, MatchTiming, RunReport, RunStatus, Scenario};

use crate::load_config;

/// Arguments for `relic run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file (defaults to ~/.relic/autonomous.yaml, then built-in defaults).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Simulated hardware scenario (YAML).
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Delay before the simulated host starts the match.
    #[arg(long, default_value_t = 0)]
    pub start_after_ms: u64,

    /// Match length after the start; a stop is requested when it elapses.
    #[arg(long, default_value_t = 30_000)]
    pub match_ms: u64,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Log as JSON lines on stderr.
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "phase")]
    phase: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "elapsed")]
    elapsed: String,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let scenario = match &self.scenario {
            Some(path) => load_scenario(path)
                .with_context(|| format!("failed to load scenario '{}'", path.display()))?,
            None => Scenario::default(),
        };
        let timing = MatchTiming {
            start_after: Duration::from_millis(self.start_after_ms),
            match_length: Duration::from_millis(self.match_ms),
        };
        let log_format = if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        };

        let report = relic_runtime::start_blocking(config, scenario, timing, log_format)
            .context("autonomous run failed to start")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
        } else {
            print_table(&report);
        }

        match &report.status {
            RunStatus::InitFailed { reason } => bail!("initialization failed: {reason}"),
            RunStatus::Aborted { phase, reason } => bail!("routine aborted in {phase}: {reason}"),
            _ => Ok(()),
        }
    }
}

fn print_table(report: &RunReport) {
    println!(
        "{} ({}) | alliance {} | {}",
        report.routine.bold(),
        report.group,
        report.alliance,
        status_label(&report.status),
    );
    if let Some(reason) = report.status.reason() {
        println!("  {reason}");
    }

    let rows: Vec<PhaseRow> = report
        .phases
        .iter()
        .enumerate()
        .map(|(n, record)| PhaseRow {
            index: n + 1,
            phase: record.phase.to_string(),
            outcome: outcome_label(&record.outcome),
            detail: match &record.outcome {
                PhaseOutcome::Failed(reason) => reason.clone(),
                _ => String::new(),
            },
            elapsed: format!("{} ms", record.elapsed_ms),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let vumark = report
        .vumark
        .map_or_else(|| "none".to_string(), |m| m.to_string());
    let jewel = report
        .jewel
        .map_or_else(|| "not read".to_string(), |j| j.to_string());
    let knocked = report
        .knocked
        .map_or_else(|| "nothing".to_string(), |d| d.to_string());
    println!("VuMark: {vumark} | jewel: {jewel} | knocked: {knocked}");
    println!(
        "Finished {} ({} ms)",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        (report.finished_at - report.started_at).num_milliseconds(),
    );
}

fn status_label(status: &RunStatus) -> String {
    let label = status.kind().to_uppercase().replace('_', " ");
    match status {
        RunStatus::Completed => label.green().bold().to_string(),
        RunStatus::CompletedWithFailures | RunStatus::Cancelled { .. } => {
            label.yellow().bold().to_string()
        }
        RunStatus::Aborted { .. } | RunStatus::InitFailed { .. } => label.red().bold().to_string(),
    }
}

fn outcome_label(outcome: &PhaseOutcome) -> String {
    match outcome {
        PhaseOutcome::Success => "success".green().to_string(),
        PhaseOutcome::Failed(_) => "failed".red().to_string(),
        PhaseOutcome::Skipped => "skipped".bright_black().to_string(),
        PhaseOutcome::Cancelled => "cancelled".yellow().to_string(),
    }
}
