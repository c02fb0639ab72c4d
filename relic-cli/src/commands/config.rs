//! `relic config init|check`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};

use relic_core::{config, AutonomousPlan};

use crate::load_config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the default config to ~/.relic/autonomous.yaml.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Validate a config and print the plan it produces.
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "phase")]
    phase: String,
    #[tabled(rename = "timeout")]
    timeout: String,
    #[tabled(rename = "on failure")]
    on_failure: String,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init { force } => init(force),
        ConfigCommand::Check { config } => check(config),
    }
}

fn init(force: bool) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let path = config::config_path_at(&home);
    let existed = path.exists();
    config::init_at(&home, force)
        .with_context(|| format!("failed to initialize '{}'", path.display()))?;
    if existed && !force {
        println!("✓ Config already present at {}", path.display());
    } else {
        println!("✓ Wrote default config to {}", path.display());
    }
    Ok(())
}

fn check(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path.as_deref())?;
    let plan = AutonomousPlan::from_config(&config).context("invalid plan")?;

    println!(
        "✓ Config valid: {} ({}) | alliance {} | motor power {}",
        config.routine.name, config.routine.group, config.alliance, config.hardware.motor_power
    );
    let rows: Vec<PlanRow> = plan
        .phases()
        .iter()
        .enumerate()
        .map(|(n, phase)| PlanRow {
            index: n + 1,
            phase: phase.kind.to_string(),
            timeout: format!("{} ms", phase.max_duration.as_millis()),
            on_failure: format!("{:?}", phase.on_failure).to_lowercase(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
