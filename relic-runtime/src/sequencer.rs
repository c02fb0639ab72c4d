//! The autonomous sequencer: acquire hardware, run the plan phase by phase,
//! unwind safely, report.
//!
//! Every phase runs against two bounds at once: the host's stop request and
//! the phase's own time budget. Whichever fires first ends the phase. After
//! an abort or a stop the robot is brought to rest before the report is
//! published; those retraction commands have their own bound and are not
//! themselves cancellable.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use relic_core::capability::{move_and_settle, Navigator};
use relic_core::config::{AutonomousConfig, AutonomousPlan, PlannedPhase};
use relic_core::types::{
    ClassificationResult, FailurePolicy, KnockDirection, PhaseKind, PhaseOutcome, Pose, VuMark,
};
use relic_core::{ConfigError, DeviceMap};
use relic_knocker::{KnockAction, MarkerKnocker};

use crate::error::PhaseError;
use crate::hardware::HardwareFacade;
use crate::report::{RunReport, RunStatus};
use crate::signals::MatchSignals;
use crate::telemetry::TelemetrySink;

/// How often the marker reader is polled while waiting for a decode.
pub const MARKER_POLL: Duration = Duration::from_millis(50);

pub struct Sequencer {
    config: AutonomousConfig,
    plan: AutonomousPlan,
}

/// Facts gathered by earlier phases and consumed by later ones.
#[derive(Debug, Default)]
struct RunState {
    vumark: Option<VuMark>,
    jewel: Option<ClassificationResult>,
    knocked: Option<KnockDirection>,
    knocker_extended: bool,
}

enum Bounded<T> {
    Done(T),
    TimedOut(Duration),
    Cancelled,
}

impl Sequencer {
    pub fn new(config: AutonomousConfig) -> Result<Self, ConfigError> {
        let plan = AutonomousPlan::from_config(&config)?;
        Ok(Self { config, plan })
    }

    pub fn config(&self) -> &AutonomousConfig {
        &self.config
    }

    pub fn plan(&self) -> &AutonomousPlan {
        &self.plan
    }

    /// Acquire hardware from `devices` and run the plan.
    ///
    /// Always returns a report with one record per planned phase. On
    /// acquisition failure nothing is commanded and every phase is skipped.
    pub async fn run(
        &self,
        devices: &mut dyn DeviceMap,
        navigator: &mut dyn Navigator,
        signals: MatchSignals,
        sink: &mut dyn TelemetrySink,
    ) -> RunReport {
        match HardwareFacade::acquire(devices, &self.config.hardware) {
            Ok(hardware) => self.execute(hardware, navigator, signals, sink).await,
            Err(err) => {
                tracing::error!(error = %err, "initialization failed; no motion attempted");
                let mut report = RunReport::begin(&self.config);
                for phase in self.plan.phases() {
                    report.record(phase.kind, PhaseOutcome::Skipped, 0);
                }
                report.finish(RunStatus::InitFailed {
                    reason: err.to_string(),
                });
                report.publish(sink);
                report
            }
        }
    }

    /// Run the plan on already-acquired hardware.
    pub async fn execute(
        &self,
        mut hardware: HardwareFacade,
        navigator: &mut dyn Navigator,
        mut signals: MatchSignals,
        sink: &mut dyn TelemetrySink,
    ) -> RunReport {
        let mut report = RunReport::begin(&self.config);
        let mut state = RunState::default();
        let mut halted: Option<RunStatus> = None;
        let mut any_failed = false;

        tracing::info!(
            routine = %self.config.routine.name,
            alliance = %self.config.alliance,
            phases = self.plan.len(),
            "routine initialized"
        );

        for phase in self.plan.phases() {
            if halted.is_some() {
                report.record(phase.kind, PhaseOutcome::Skipped, 0);
                continue;
            }
            if signals.is_stopped() {
                tracing::warn!(phase = %phase.kind, "match stopped before phase began");
                halted = Some(RunStatus::Cancelled { phase: None });
                report.record(phase.kind, PhaseOutcome::Skipped, 0);
                continue;
            }

            tracing::info!(phase = %phase.kind, budget_ms = phase.max_duration.as_millis() as u64, "phase started");
            let started = Instant::now();
            let outcome = self
                .run_phase(phase, &mut hardware, navigator, &mut signals, &mut state)
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &outcome {
                PhaseOutcome::Success => {
                    tracing::info!(phase = %phase.kind, elapsed_ms, "phase succeeded");
                }
                PhaseOutcome::Failed(reason) => {
                    any_failed = true;
                    tracing::warn!(phase = %phase.kind, elapsed_ms, reason = %reason, policy = ?phase.on_failure, "phase failed");
                    if phase.on_failure == FailurePolicy::Abort {
                        halted = Some(RunStatus::Aborted {
                            phase: phase.kind,
                            reason: reason.clone(),
                        });
                    }
                }
                PhaseOutcome::Cancelled => {
                    tracing::warn!(phase = %phase.kind, elapsed_ms, "phase cancelled by host");
                    halted = Some(RunStatus::Cancelled {
                        phase: Some(phase.kind),
                    });
                }
                PhaseOutcome::Skipped => {}
            }
            // Nothing else may move while the knocker is out, whatever the policy.
            if state.knocker_extended && halted.is_none() {
                let reason = match &outcome {
                    PhaseOutcome::Failed(reason) => reason.clone(),
                    _ => PhaseError::ArmExtended.to_string(),
                };
                tracing::error!(phase = %phase.kind, reason = %reason, "knocker arm left extended; aborting");
                halted = Some(RunStatus::Aborted {
                    phase: phase.kind,
                    reason,
                });
            }
            report.record(phase.kind, outcome, elapsed_ms);
        }

        let status = halted.unwrap_or(if any_failed {
            RunStatus::CompletedWithFailures
        } else {
            RunStatus::Completed
        });
        if status.halted_early() {
            self.bring_to_rest(&mut hardware, navigator, &mut state).await;
        }

        report.vumark = state.vumark;
        report.jewel = state.jewel;
        report.knocked = state.knocked;
        report.finish(status);
        tracing::info!(status = report.status.kind(), "routine finished");
        report.publish(sink);
        report
    }

    async fn run_phase(
        &self,
        phase: &PlannedPhase,
        hardware: &mut HardwareFacade,
        navigator: &mut dyn Navigator,
        signals: &mut MatchSignals,
        state: &mut RunState,
    ) -> PhaseOutcome {
        let limit = phase.max_duration;
        match phase.kind {
            PhaseKind::SecurePayload => {
                let closed = self.config.clamp.closed_position;
                outcome(bounded(signals, limit, self.set_clamps(hardware, closed)).await)
            }
            PhaseKind::AwaitStart => {
                let mut gate = signals.clone();
                // A stop while waiting is seen by both futures; cancellation wins.
                let wait = async move { gate.wait_for_start().await.map_err(PhaseError::from) };
                outcome(bounded(signals, limit, wait).await)
            }
            PhaseKind::ReadMarker => {
                let reader = hardware.marker_reader();
                let poll = async move {
                    loop {
                        if let Some(mark) = reader.read().await {
                            return mark;
                        }
                        tokio::time::sleep(MARKER_POLL).await;
                    }
                };
                match bounded(signals, limit, poll).await {
                    Bounded::Done(mark) => {
                        tracing::info!(vumark = %mark, "VuMark decoded");
                        state.vumark = Some(mark);
                        PhaseOutcome::Success
                    }
                    Bounded::TimedOut(_) => PhaseOutcome::Failed(PhaseError::NoMarker.to_string()),
                    Bounded::Cancelled => PhaseOutcome::Cancelled,
                }
            }
            PhaseKind::KnockJewel => self.knock_jewel(limit, hardware, signals, state).await,
            PhaseKind::Navigate => {
                let column = state.vumark.unwrap_or_else(|| {
                    tracing::info!(column = %self.config.navigation.default_column, "no VuMark; using default column");
                    self.config.navigation.default_column
                });
                let pose = self.config.navigation.columns.pose_for(column);
                self.drive(navigator, pose, limit, signals).await
            }
            PhaseKind::ScorePayload => {
                let open = self.config.clamp.open_position;
                outcome(bounded(signals, limit, self.set_clamps(hardware, open)).await)
            }
            PhaseKind::Park => {
                let pose = self.config.navigation.park;
                self.drive(navigator, pose, limit, signals).await
            }
        }
    }

    /// Command both clamp arms, then report the first fault.
    async fn set_clamps(&self, hardware: &mut HardwareFacade, position: f64) -> Result<(), PhaseError> {
        let settle = self.config.clamp.settle;
        let (left, right) = hardware.clamps();
        let left = move_and_settle(left, position, settle).await;
        let right = move_and_settle(right, position, settle).await;
        left.map_err(|fault| PhaseError::Clamp { side: "left", fault })?;
        right.map_err(|fault| PhaseError::Clamp { side: "right", fault })?;
        Ok(())
    }

    async fn knock_jewel(
        &self,
        limit: Duration,
        hardware: &mut HardwareFacade,
        signals: &mut MatchSignals,
        state: &mut RunState,
    ) -> PhaseOutcome {
        let motor_power = hardware.motor_power();
        let mut knocker = match MarkerKnocker::new(
            hardware.knocker_io(),
            &self.config.knocker,
            self.config.alliance,
            motor_power,
        ) {
            Ok(knocker) => knocker,
            Err(err) => return PhaseOutcome::Failed(PhaseError::from(err).to_string()),
        };

        let result = bounded(signals, limit, knocker.run(self.config.knocker.remove)).await;
        match result {
            Bounded::Done(Ok(report)) => {
                state.jewel = Some(report.classification);
                if let KnockAction::Knocked(direction) = report.action {
                    state.knocked = Some(direction);
                }
                state.knocker_extended = knocker.arm_extended();
                PhaseOutcome::Success
            }
            Bounded::Done(Err(err)) => {
                state.knocker_extended = knocker.arm_extended();
                PhaseOutcome::Failed(PhaseError::from(err).to_string())
            }
            interrupted => {
                // The protocol was dropped mid-flight; its own raise never ran.
                if knocker.arm_extended() {
                    let retract = Duration::from_millis(self.config.safety.retract_timeout_ms);
                    match tokio::time::timeout(retract, knocker.raise_arm()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => tracing::error!(error = %err, "knocker retraction failed"),
                        Err(_) => tracing::error!(timeout_ms = retract.as_millis() as u64, "knocker retraction timed out"),
                    }
                }
                state.knocker_extended = knocker.arm_extended();
                match interrupted {
                    Bounded::TimedOut(after) => {
                        PhaseOutcome::Failed(PhaseError::TimedOut(after.as_millis() as u64).to_string())
                    }
                    _ => PhaseOutcome::Cancelled,
                }
            }
        }
    }

    async fn drive(
        &self,
        navigator: &mut dyn Navigator,
        pose: Pose,
        limit: Duration,
        signals: &mut MatchSignals,
    ) -> PhaseOutcome {
        tracing::debug!(x_mm = pose.x_mm, y_mm = pose.y_mm, heading_deg = pose.heading_deg, "driving");
        let result = bounded(signals, limit, navigator.drive_to(pose)).await;
        if let Bounded::TimedOut(_) = result {
            // Still moving toward a pose it will never reach in time.
            self.stop_navigator(navigator).await;
        }
        outcome(result.map(|r| r.map_err(PhaseError::from)))
    }

    /// Halt motion and retract anything left extended. Bounded, and never
    /// raced against the stop signal.
    async fn bring_to_rest(
        &self,
        hardware: &mut HardwareFacade,
        navigator: &mut dyn Navigator,
        state: &mut RunState,
    ) {
        tracing::info!("bringing robot to rest");
        self.stop_navigator(navigator).await;

        if state.knocker_extended {
            let retract = Duration::from_millis(self.config.safety.retract_timeout_ms);
            let raised = self.config.knocker.raised_position;
            let settle = self.config.knocker.settle;
            match tokio::time::timeout(retract, move_and_settle(hardware.knocker_arm(), raised, settle)).await {
                Ok(Ok(())) => state.knocker_extended = false,
                Ok(Err(fault)) => tracing::error!(error = %fault, "knocker arm could not be retracted"),
                Err(_) => tracing::error!("knocker arm retraction timed out"),
            }
        }
    }

    async fn stop_navigator(&self, navigator: &mut dyn Navigator) {
        let retract = Duration::from_millis(self.config.safety.retract_timeout_ms);
        if tokio::time::timeout(retract, navigator.stop()).await.is_err() {
            tracing::error!(timeout_ms = retract.as_millis() as u64, "navigator did not stop in time");
        }
    }
}

impl<T> Bounded<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Bounded<U> {
        match self {
            Bounded::Done(value) => Bounded::Done(f(value)),
            Bounded::TimedOut(after) => Bounded::TimedOut(after),
            Bounded::Cancelled => Bounded::Cancelled,
        }
    }
}

/// Race `work` against the host's stop request and `limit`.
async fn bounded<F: Future>(signals: &mut MatchSignals, limit: Duration, work: F) -> Bounded<F::Output> {
    tokio::select! {
        biased;
        _ = signals.cancelled() => Bounded::Cancelled,
        result = tokio::time::timeout(limit, work) => match result {
            Ok(value) => Bounded::Done(value),
            Err(_) => Bounded::TimedOut(limit),
        },
    }
}

fn outcome(result: Bounded<Result<(), PhaseError>>) -> PhaseOutcome {
    match result {
        Bounded::Done(Ok(())) => PhaseOutcome::Success,
        Bounded::Done(Err(err)) => PhaseOutcome::Failed(err.to_string()),
        Bounded::TimedOut(after) => {
            PhaseOutcome::Failed(PhaseError::TimedOut(after.as_millis() as u64).to_string())
        }
        Bounded::Cancelled => PhaseOutcome::Cancelled,
    }
}
