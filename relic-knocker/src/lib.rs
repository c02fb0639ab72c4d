//! # relic-knocker
//!
//! The jewel knocker: lower the sensor arm, classify the jewel in front of
//! it, push one jewel off its stand, raise the arm.
//!
//! ```text
//! ArmRaised ──lower_arm──▶ ArmLowered ──detect──▶ Classified(r)
//!     ▲                                               │
//!     │                                         remove_jewel
//!     │                                               ▼
//!     └─────────────raise_arm──────────────── ActionTaken
//! ```
//!
//! [`MarkerKnocker::run`] drives the whole protocol and raises the arm
//! exactly once on every path, including a failed lowering and an
//! indeterminate read.

mod error;

use std::fmt;
use std::time::Duration;

use relic_classifier::{majority, ColorClassifier};
use relic_core::capability::{move_and_settle, ColorSensor, Drivetrain, Servo, Settle};
use relic_core::config::{KnockerConfig, SamplingConfig};
use relic_core::types::{AllianceColor, ClassificationResult, KnockDirection, TeamIdentity};

pub use error::{KnockStep, KnockerError};

/// Borrowed hardware the knocker drives. Owned by the caller's facade.
pub struct KnockerIo<'a> {
    pub arm: &'a mut dyn Servo,
    pub sensor: &'a mut dyn ColorSensor,
    pub drive: &'a mut dyn Drivetrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnockerState {
    ArmRaised,
    ArmLowered,
    Classified(ClassificationResult),
    ActionTaken,
    /// An actuator command failed; the arm position is unknown.
    Faulted,
}

impl fmt::Display for KnockerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnockerState::ArmRaised => write!(f, "arm raised"),
            KnockerState::ArmLowered => write!(f, "arm lowered"),
            KnockerState::Classified(result) => write!(f, "classified ({result})"),
            KnockerState::ActionTaken => write!(f, "action taken"),
            KnockerState::Faulted => write!(f, "faulted"),
        }
    }
}

/// What `remove_jewel` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnockAction {
    Knocked(KnockDirection),
    /// Indeterminate read: nothing was moved.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnockReport {
    pub classification: ClassificationResult,
    pub action: KnockAction,
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    raised: f64,
    lowered: f64,
    settle: Settle,
    sampling: SamplingConfig,
    facing: KnockDirection,
    power: f64,
}

pub struct MarkerKnocker<'a> {
    io: KnockerIo<'a>,
    classifier: ColorClassifier,
    motion: Motion,
    state: KnockerState,
    arm_extended: bool,
}

/// `true` when the jewel under the sensor is the one to knock off.
pub fn toward_detected(detected: TeamIdentity, remove: TeamIdentity) -> bool {
    detected == remove
}

impl<'a> MarkerKnocker<'a> {
    /// `motor_power` scales the configured knock power.
    pub fn new(
        io: KnockerIo<'a>,
        config: &KnockerConfig,
        alliance: AllianceColor,
        motor_power: f64,
    ) -> Result<Self, KnockerError> {
        let classifier = ColorClassifier::for_alliance(alliance, config)?;
        Ok(Self {
            io,
            classifier,
            motion: Motion {
                raised: config.raised_position,
                lowered: config.lowered_position,
                settle: config.settle,
                sampling: config.sampling,
                facing: config.sensor_facing,
                power: config.knock_power * motor_power,
            },
            state: KnockerState::ArmRaised,
            arm_extended: false,
        })
    }

    pub fn state(&self) -> KnockerState {
        self.state
    }

    /// True from the first lowering command until a confirmed raise.
    pub fn arm_extended(&self) -> bool {
        self.arm_extended
    }

    /// Lower, classify, act, raise. The arm is raised exactly once whatever
    /// happens before it; the first error wins.
    pub async fn run(&mut self, remove: TeamIdentity) -> Result<KnockReport, KnockerError> {
        let attempt = self.lower_detect_act(remove).await;
        let raised = self.raise_arm().await;
        let report = attempt?;
        raised?;
        Ok(report)
    }

    async fn lower_detect_act(&mut self, remove: TeamIdentity) -> Result<KnockReport, KnockerError> {
        self.lower_arm().await?;
        let classification = self.detect().await?;
        let toward = classification
            .side()
            .is_some_and(|detected| toward_detected(detected, remove));
        let action = self.remove_jewel(toward).await?;
        Ok(KnockReport {
            classification,
            action,
        })
    }

    /// ArmRaised → ArmLowered.
    pub async fn lower_arm(&mut self) -> Result<(), KnockerError> {
        self.expect_state(KnockStep::LowerArm, |s| s == KnockerState::ArmRaised)?;
        self.arm_extended = true;
        match move_and_settle(&mut *self.io.arm, self.motion.lowered, self.motion.settle).await {
            Ok(()) => {
                tracing::debug!(position = self.motion.lowered, "knocker arm lowered");
                self.state = KnockerState::ArmLowered;
                Ok(())
            }
            Err(fault) => {
                tracing::warn!(error = %fault, "knocker arm failed to lower");
                self.state = KnockerState::Faulted;
                Err(KnockerError::Actuator {
                    step: KnockStep::LowerArm,
                    fault,
                })
            }
        }
    }

    /// ArmLowered → Classified. Reads only; never moves anything.
    pub async fn detect(&mut self) -> Result<ClassificationResult, KnockerError> {
        self.expect_state(KnockStep::Detect, |s| s == KnockerState::ArmLowered)?;

        let samples = self.motion.sampling.samples.max(1);
        let interval = Duration::from_millis(self.motion.sampling.interval_ms);
        let mut results = Vec::with_capacity(samples as usize);
        for n in 0..samples {
            if n > 0 {
                tokio::time::sleep(interval).await;
            }
            let reading = self.io.sensor.read().await;
            let verdict = self.classifier.classify_reading(reading.as_ref());
            if let Some(reason) = verdict.ambiguity {
                tracing::debug!(sample = n, reason = ?reason, "ambiguous jewel sample");
            }
            results.push(verdict.result);
        }

        let result = if samples == 1 {
            results[0]
        } else {
            majority(&results)
        };
        tracing::info!(result = %result, samples, "jewel classified");
        self.state = KnockerState::Classified(result);
        Ok(result)
    }

    /// Classified → ActionTaken, or a no-op on an indeterminate read.
    ///
    /// `toward_detected == true` drives toward the side the sensor faces,
    /// pushing the jewel the sensor is looking at off its stand.
    pub async fn remove_jewel(&mut self, toward_detected: bool) -> Result<KnockAction, KnockerError> {
        let classification = match self.state {
            KnockerState::Classified(result) => result,
            other => {
                return Err(KnockerError::InvalidTransition {
                    step: KnockStep::RemoveJewel,
                    state: other,
                })
            }
        };

        if classification == ClassificationResult::Indeterminate {
            tracing::info!("indeterminate jewel read; leaving both jewels in place");
            return Ok(KnockAction::Skipped);
        }

        let direction = if toward_detected {
            self.motion.facing
        } else {
            self.motion.facing.reverse()
        };
        match self.io.drive.nudge(direction, self.motion.power).await {
            Ok(()) => {
                tracing::info!(direction = %direction, toward_detected, "jewel knocked");
                self.state = KnockerState::ActionTaken;
                Ok(KnockAction::Knocked(direction))
            }
            Err(fault) => {
                tracing::warn!(error = %fault, "knock motion failed");
                self.state = KnockerState::Faulted;
                Err(KnockerError::Actuator {
                    step: KnockStep::RemoveJewel,
                    fault,
                })
            }
        }
    }

    /// Any state → ArmRaised. Always commands the servo, so it doubles as the
    /// best-effort retraction after a fault.
    pub async fn raise_arm(&mut self) -> Result<(), KnockerError> {
        match move_and_settle(&mut *self.io.arm, self.motion.raised, self.motion.settle).await {
            Ok(()) => {
                tracing::debug!(position = self.motion.raised, "knocker arm raised");
                self.state = KnockerState::ArmRaised;
                self.arm_extended = false;
                Ok(())
            }
            Err(fault) => {
                tracing::error!(error = %fault, "knocker arm failed to raise");
                self.state = KnockerState::Faulted;
                Err(KnockerError::Actuator {
                    step: KnockStep::RaiseArm,
                    fault,
                })
            }
        }
    }

    fn expect_state(
        &self,
        step: KnockStep,
        allowed: impl Fn(KnockerState) -> bool,
    ) -> Result<(), KnockerError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(KnockerError::InvalidTransition {
                step,
                state: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests;
