//! `relic classify --red R --blue B`: run the jewel classifier on one reading.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use relic_classifier::{Ambiguity, ColorClassifier};
use relic_core::types::{ClassificationResult, ColorSample, Threshold};

use crate::AllianceArg;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[arg(long)]
    pub red: f64,

    #[arg(long)]
    pub blue: f64,

    /// Minimum relative red/blue difference, in [0, 1).
    #[arg(long, default_value_t = 0.3)]
    pub margin: f64,

    #[arg(long, default_value = "red")]
    pub alliance: AllianceArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ClassifyJson {
    alliance: String,
    margin: f64,
    #[serde(flatten)]
    result: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    ambiguity: Option<Ambiguity>,
}

impl ClassifyArgs {
    pub fn run(self) -> Result<()> {
        let margin = Threshold::new(self.margin).context("invalid --margin")?;
        let alliance = self.alliance.0;
        let classifier = ColorClassifier::new(margin, alliance.channel_mapping(), None)
            .context("failed to build classifier")?;
        let verdict = classifier.classify_reading(Some(&ColorSample::new(self.red, self.blue)));

        if self.json {
            let payload = ClassifyJson {
                alliance: alliance.to_string(),
                margin: margin.value(),
                result: verdict.result,
                ambiguity: verdict.ambiguity,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize result")?
            );
            return Ok(());
        }

        let label = match verdict.result {
            ClassificationResult::Identified(side) => side.to_string().to_uppercase().green().bold(),
            ClassificationResult::Indeterminate => "INDETERMINATE".yellow().bold(),
        };
        println!("{label}");
        if let Some(reason) = verdict.ambiguity {
            println!("  reason: {reason:?}");
        }
        Ok(())
    }
}
