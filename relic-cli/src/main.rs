//! Relic: autonomous routine controller for the competition robot.
//!
//! # Usage
//!
//! ```text
//! relic run [--config <path>] [--scenario <path>] [--start-after-ms N] [--match-ms N] [--json]
//! relic config init [--force]
//! relic config check [--config <path>]
//! relic classify --red R --blue B [--margin M] [--alliance red|blue]
//! ```

mod commands;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{classify::ClassifyArgs, config::ConfigCommand, run::RunArgs};
use relic_core::{config, AllianceColor, AutonomousConfig};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "relic",
    version,
    about = "Run and inspect the robot's autonomous routine",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the autonomous routine against simulated hardware.
    Run(RunArgs),

    /// Create or validate ~/.relic/autonomous.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Classify a single colour reading.
    Classify(ClassifyArgs),
}

// ---------------------------------------------------------------------------
// Shared arguments
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `AllianceColor` from CLI args.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllianceArg(pub AllianceColor);

impl FromStr for AllianceArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(Self(AllianceColor::Red)),
            "blue" => Ok(Self(AllianceColor::Blue)),
            other => Err(format!("unknown alliance '{other}'; expected: red, blue")),
        }
    }
}

impl fmt::Display for AllianceArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Load `path` if given, else `~/.relic/autonomous.yaml` if present, else
/// the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AutonomousConfig> {
    if let Some(path) = path {
        return config::load_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()));
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    let default_path = config::config_path_at(&home);
    if default_path.exists() {
        config::load_file(&default_path)
            .with_context(|| format!("failed to load config '{}'", default_path.display()))
    } else {
        Ok(AutonomousConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Classify(args) => args.run(),
    }
}
