//! Hardware capabilities the routine consumes.
//!
//! Drivers live outside this workspace; the routine only ever sees these
//! traits, so simulated or mocked devices can stand in for the robot.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ColorSample, KnockDirection, Pose, VuMark};

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// An actuator did not reach, or refused, its commanded state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorFault {
    #[error("actuator rejected command: {0}")]
    Rejected(String),

    #[error("actuator did not confirm position within {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("actuator disconnected")]
    Disconnected,
}

/// Navigation did not complete. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("navigation failed: {0}")]
pub struct NavigationFault(pub String);

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Positional actuator (clamp arms, knocker arm). Commands are idempotent.
#[async_trait]
pub trait Servo: Send {
    async fn set_position(&mut self, position: f64) -> Result<(), ActuatorFault>;

    /// Resolves once the servo reports it has reached the last commanded
    /// position. Callers bound this with their own timeout.
    async fn await_in_position(&mut self) -> Result<(), ActuatorFault>;

    fn self_test(&self) -> Result<(), ActuatorFault> {
        Ok(())
    }
}

/// Pull-based colour sensor. `None` means not ready or no light.
#[async_trait]
pub trait ColorSensor: Send {
    async fn read(&mut self) -> Option<ColorSample>;

    fn is_connected(&self) -> bool {
        true
    }
}

/// The drive base, as far as the jewel knocker needs it.
#[async_trait]
pub trait Drivetrain: Send {
    /// One short directional motion used to knock a jewel off its stand.
    async fn nudge(&mut self, direction: KnockDirection, power: f64) -> Result<(), ActuatorFault>;

    fn self_test(&self) -> Result<(), ActuatorFault> {
        Ok(())
    }
}

/// Opaque pose execution. Blocking from the caller's point of view.
#[async_trait]
pub trait Navigator: Send {
    async fn drive_to(&mut self, pose: Pose) -> Result<(), NavigationFault>;

    async fn turn_by(&mut self, degrees: f64) -> Result<(), NavigationFault>;

    /// Best-effort halt, used when the routine unwinds early.
    async fn stop(&mut self);
}

/// Already-decoded fiducial output.
#[async_trait]
pub trait MarkerReader: Send {
    async fn read(&mut self) -> Option<VuMark>;
}

/// Name-based device lookup supplied by the host.
pub trait DeviceMap {
    fn servo(&mut self, name: &str) -> Option<Box<dyn Servo>>;
    fn color_sensor(&mut self, name: &str) -> Option<Box<dyn ColorSensor>>;
    fn drivetrain(&mut self, name: &str) -> Option<Box<dyn Drivetrain>>;
    fn marker_reader(&mut self, name: &str) -> Option<Box<dyn MarkerReader>>;
}

// ---------------------------------------------------------------------------
// Settling
// ---------------------------------------------------------------------------

/// How to decide that a servo has reached its commanded position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Settle {
    /// Wait a fixed time after commanding.
    Timed { millis: u64 },
    /// Wait for the servo's confirmation, at most `timeout_ms`.
    Confirmed { timeout_ms: u64 },
}

impl Default for Settle {
    fn default() -> Self {
        Settle::Timed { millis: 400 }
    }
}

/// Command `servo` to `position` and block until it has settled.
pub async fn move_and_settle(
    servo: &mut dyn Servo,
    position: f64,
    settle: Settle,
) -> Result<(), ActuatorFault> {
    servo.set_position(position).await?;
    match settle {
        Settle::Timed { millis } => {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(())
        }
        Settle::Confirmed { timeout_ms } => {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), servo.await_in_position())
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ActuatorFault::Timeout {
                    after_ms: timeout_ms,
                }),
            }
        }
    }
}
