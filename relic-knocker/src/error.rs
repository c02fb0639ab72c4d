//! Error types for relic-knocker.

use std::fmt;

use relic_classifier::ClassifierError;
use relic_core::capability::ActuatorFault;
use thiserror::Error;

use crate::KnockerState;

/// The four protocol steps, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnockStep {
    LowerArm,
    Detect,
    RemoveJewel,
    RaiseArm,
}

impl fmt::Display for KnockStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnockStep::LowerArm => write!(f, "lower arm"),
            KnockStep::Detect => write!(f, "detect"),
            KnockStep::RemoveJewel => write!(f, "remove jewel"),
            KnockStep::RaiseArm => write!(f, "raise arm"),
        }
    }
}

/// Error surface for the knocker state machine.
#[derive(Debug, Error)]
pub enum KnockerError {
    #[error("{step} failed: {fault}")]
    Actuator {
        step: KnockStep,
        #[source]
        fault: ActuatorFault,
    },

    #[error("cannot {step} while {state}")]
    InvalidTransition { step: KnockStep, state: KnockerState },

    #[error("classifier config error: {0}")]
    Classifier(#[from] ClassifierError),
}
