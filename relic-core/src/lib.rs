//! Relic core library: domain types, hardware capabilities, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: team identity, colour samples, plan vocabulary
//! - [`capability`]: traits the routine drives hardware through
//! - [`config`]: `autonomous.yaml` load / save / init and plan construction
//! - [`error`]: [`ConfigError`]

pub mod capability;
pub mod config;
pub mod error;
pub mod types;

pub use capability::{
    move_and_settle, ActuatorFault, ColorSensor, DeviceMap, Drivetrain, MarkerReader,
    NavigationFault, Navigator, Servo, Settle,
};
pub use config::{AutonomousConfig, AutonomousPlan, PhaseEntry, PlannedPhase};
pub use error::ConfigError;
pub use types::{
    opposite, AllianceColor, ChannelMapping, ClassificationResult, ColorSample, FailurePolicy,
    KnockDirection, PhaseKind, PhaseOutcome, Pose, TeamIdentity, Threshold, ThresholdError,
    VuMark,
};
