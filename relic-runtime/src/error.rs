//! Error types for relic-runtime.

use std::fmt;
use std::path::PathBuf;

use relic_core::capability::{ActuatorFault, NavigationFault};
use relic_knocker::KnockerError;
use thiserror::Error;

use crate::signals::Cancelled;

/// Kind of device looked up during acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Servo,
    ColorSensor,
    Drivetrain,
    MarkerReader,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Servo => write!(f, "servo"),
            DeviceKind::ColorSensor => write!(f, "color sensor"),
            DeviceKind::Drivetrain => write!(f, "drivetrain"),
            DeviceKind::MarkerReader => write!(f, "marker reader"),
        }
    }
}

/// Why the hardware facade could not be acquired. Always raised before any
/// actuator has been commanded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    #[error("motor power scale {0} is outside (0, 1]")]
    InvalidPowerScale(f64),

    #[error("required {kind} `{name}` is not in the device map")]
    Missing { kind: DeviceKind, name: String },

    #[error("{kind} `{name}` failed its self-test: {reason}")]
    Faulted {
        kind: DeviceKind,
        name: String,
        reason: String,
    },
}

/// Phase-local failure; its message becomes the phase's `Failed` reason.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("{side} clamp: {fault}")]
    Clamp {
        side: &'static str,
        #[source]
        fault: ActuatorFault,
    },

    #[error("jewel knocker: {0}")]
    Knocker(#[from] KnockerError),

    #[error(transparent)]
    Navigation(#[from] NavigationFault),

    #[error(transparent)]
    Stopped(#[from] Cancelled),

    #[error("no VuMark decoded")]
    NoMarker,

    #[error("knocker arm still extended")]
    ArmExtended,

    #[error("timed out after {0} ms")]
    TimedOut(u64),
}

/// Error surface for the runtime entry points (not for a run itself, which
/// always produces a report).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] relic_core::ConfigError),

    #[error("failed to parse scenario at {path}: {source}")]
    Scenario {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("host task failed: {0}")]
    Host(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        path: path.into(),
        source,
    }
}
