//! The run report: one record per planned phase, in plan order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use relic_core::config::AutonomousConfig;
use relic_core::types::{
    AllianceColor, ClassificationResult, KnockDirection, PhaseKind, PhaseOutcome, VuMark,
};

use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RunStatus {
    /// Every phase ran and succeeded.
    Completed,
    /// Every phase ran; at least one failed under a continue policy.
    CompletedWithFailures,
    Aborted { phase: PhaseKind, reason: String },
    /// `phase` is the phase in flight when the stop arrived, if any.
    Cancelled { phase: Option<PhaseKind> },
    /// Hardware acquisition failed; nothing moved.
    InitFailed { reason: String },
}

impl RunStatus {
    pub fn kind(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithFailures => "completed_with_failures",
            RunStatus::Aborted { .. } => "aborted",
            RunStatus::Cancelled { .. } => "cancelled",
            RunStatus::InitFailed { .. } => "init_failed",
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            RunStatus::Aborted { phase, reason } => Some(format!("{phase}: {reason}")),
            RunStatus::Cancelled { phase: Some(phase) } => Some(format!("stopped during {phase}")),
            RunStatus::Cancelled { phase: None } => Some("stopped between phases".to_string()),
            RunStatus::InitFailed { reason } => Some(reason.clone()),
            RunStatus::Completed | RunStatus::CompletedWithFailures => None,
        }
    }

    /// The run ended before every phase had its turn.
    pub fn halted_early(&self) -> bool {
        matches!(
            self,
            RunStatus::Aborted { .. } | RunStatus::Cancelled { .. } | RunStatus::InitFailed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    pub phase: PhaseKind,
    #[serde(flatten)]
    pub outcome: PhaseOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub routine: String,
    pub group: String,
    pub alliance: AllianceColor,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub phases: Vec<PhaseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vumark: Option<VuMark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jewel: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knocked: Option<KnockDirection>,
}

impl RunReport {
    pub(crate) fn begin(config: &AutonomousConfig) -> Self {
        let now = Utc::now();
        Self {
            routine: config.routine.name.clone(),
            group: config.routine.group.clone(),
            alliance: config.alliance,
            started_at: now,
            finished_at: now,
            status: RunStatus::Completed,
            phases: Vec::new(),
            vumark: None,
            jewel: None,
            knocked: None,
        }
    }

    pub(crate) fn record(&mut self, phase: PhaseKind, outcome: PhaseOutcome, elapsed_ms: u64) {
        self.phases.push(PhaseRecord {
            phase,
            outcome,
            elapsed_ms,
        });
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Utc::now();
    }

    pub fn outcome_of(&self, phase: PhaseKind) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|record| record.phase == phase)
            .map(|record| &record.outcome)
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Flatten into ordered telemetry pairs.
    pub fn to_key_values(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.phases.len() + 6);
        if let RunStatus::InitFailed { reason } = &self.status {
            pairs.push(("FATAL".to_string(), "ERROR".to_string()));
            pairs.push(("Initialization failed".to_string(), reason.clone()));
        }
        pairs.push(("routine".to_string(), self.routine.clone()));
        pairs.push(("alliance".to_string(), self.alliance.to_string()));
        pairs.push(("status".to_string(), self.status.kind().to_string()));
        if let Some(reason) = self.status.reason() {
            pairs.push(("status.reason".to_string(), reason));
        }
        for (n, record) in self.phases.iter().enumerate() {
            pairs.push((
                format!("phase.{}.{}", n + 1, record.phase),
                record.outcome.to_string(),
            ));
        }
        if let Some(mark) = self.vumark {
            pairs.push(("vumark".to_string(), mark.to_string()));
        }
        if let Some(jewel) = self.jewel {
            pairs.push(("jewel".to_string(), jewel.to_string()));
        }
        pairs
    }

    /// Stage every pair on `sink` and push one update.
    pub fn publish(&self, sink: &mut dyn TelemetrySink) {
        for (key, value) in self.to_key_values() {
            sink.add_data(&key, &value);
        }
        sink.update();
    }
}
