//! Domain types for the autonomous routine.
//!
//! Everything here is a plain value: no I/O, no clocks. Types that appear in
//! the YAML configuration or in a run report derive serde.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Team identity
// ---------------------------------------------------------------------------

/// Which side of the field a game element belongs to, relative to this robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamIdentity {
    OwnSide,
    OpposingSide,
}

impl TeamIdentity {
    pub const ALL: [TeamIdentity; 2] = [TeamIdentity::OwnSide, TeamIdentity::OpposingSide];

    /// The other side. Total and an involution.
    pub fn opposite(self) -> Self {
        opposite(self)
    }
}

/// Free-function form of [`TeamIdentity::opposite`].
pub fn opposite(side: TeamIdentity) -> TeamIdentity {
    match side {
        TeamIdentity::OwnSide => TeamIdentity::OpposingSide,
        TeamIdentity::OpposingSide => TeamIdentity::OwnSide,
    }
}

impl fmt::Display for TeamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamIdentity::OwnSide => write!(f, "own"),
            TeamIdentity::OpposingSide => write!(f, "opposing"),
        }
    }
}

/// Alliance colour this robot plays for in a given match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllianceColor {
    #[default]
    Red,
    Blue,
}

impl AllianceColor {
    pub fn opposite(self) -> Self {
        match self {
            AllianceColor::Red => AllianceColor::Blue,
            AllianceColor::Blue => AllianceColor::Red,
        }
    }

    /// Maps a jewel colour to a side: our own colour is [`TeamIdentity::OwnSide`].
    pub fn side_of(self, color: AllianceColor) -> TeamIdentity {
        if color == self {
            TeamIdentity::OwnSide
        } else {
            TeamIdentity::OpposingSide
        }
    }

    /// Channel mapping used by the colour classifier for this alliance.
    pub fn channel_mapping(self) -> ChannelMapping {
        ChannelMapping {
            red_side: self.side_of(AllianceColor::Red),
        }
    }
}

impl fmt::Display for AllianceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllianceColor::Red => write!(f, "red"),
            AllianceColor::Blue => write!(f, "blue"),
        }
    }
}

// ---------------------------------------------------------------------------
// Colour sensing
// ---------------------------------------------------------------------------

/// One snapshot of colour sensor channel intensities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub red: f64,
    pub blue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<f64>,
}

impl ColorSample {
    pub fn new(red: f64, blue: f64) -> Self {
        Self {
            red,
            blue,
            green: None,
            clear: None,
        }
    }

    /// False for negative or non-finite red/blue readings.
    pub fn is_valid(&self) -> bool {
        [self.red, self.blue]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Which side the red channel stands for; blue is always the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMapping {
    pub red_side: TeamIdentity,
}

impl ChannelMapping {
    pub fn blue_side(&self) -> TeamIdentity {
        self.red_side.opposite()
    }
}

/// Minimum relative red/blue difference, as a fraction of their sum.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

#[derive(Debug, Clone, PartialEq, Error)]
#[error("margin must be a finite fraction in [0, 1), got {0}")]
pub struct ThresholdError(pub f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_finite() && (0.0..1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ThresholdError(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(0.3)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> Self {
        t.0
    }
}

/// Outcome of classifying one or more colour samples.
///
/// Ambiguity is its own state: nothing downstream may turn `Indeterminate`
/// into a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "side")]
pub enum ClassificationResult {
    Identified(TeamIdentity),
    Indeterminate,
}

impl ClassificationResult {
    pub fn side(self) -> Option<TeamIdentity> {
        match self {
            ClassificationResult::Identified(side) => Some(side),
            ClassificationResult::Indeterminate => None,
        }
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationResult::Identified(side) => write!(f, "{side}"),
            ClassificationResult::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Direction of the knocker's single directional action, relative to the
/// side the colour sensor faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnockDirection {
    #[default]
    Forward,
    Backward,
}

impl KnockDirection {
    pub fn reverse(self) -> Self {
        match self {
            KnockDirection::Forward => KnockDirection::Backward,
            KnockDirection::Backward => KnockDirection::Forward,
        }
    }
}

impl fmt::Display for KnockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnockDirection::Forward => write!(f, "forward"),
            KnockDirection::Backward => write!(f, "backward"),
        }
    }
}

/// Field pose in millimetres and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub x_mm: f64,
    pub y_mm: f64,
    #[serde(default)]
    pub heading_deg: f64,
}

impl Pose {
    pub const fn new(x_mm: f64, y_mm: f64, heading_deg: f64) -> Self {
        Self {
            x_mm,
            y_mm,
            heading_deg,
        }
    }
}

/// Decoded positional marker: which cryptobox column scores the bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VuMark {
    Left,
    #[default]
    Center,
    Right,
}

impl fmt::Display for VuMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VuMark::Left => write!(f, "left"),
            VuMark::Center => write!(f, "center"),
            VuMark::Right => write!(f, "right"),
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// The named phases an autonomous plan is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    SecurePayload,
    AwaitStart,
    ReadMarker,
    KnockJewel,
    Navigate,
    ScorePayload,
    Park,
}

impl PhaseKind {
    /// Losing the payload or never getting the start signal invalidates
    /// everything after it; every other phase is worth skipping past.
    pub fn default_policy(self) -> FailurePolicy {
        match self {
            PhaseKind::SecurePayload | PhaseKind::AwaitStart => FailurePolicy::Abort,
            _ => FailurePolicy::Continue,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PhaseKind::SecurePayload => "secure_payload",
            PhaseKind::AwaitStart => "await_start",
            PhaseKind::ReadMarker => "read_marker",
            PhaseKind::KnockJewel => "knock_jewel",
            PhaseKind::Navigate => "navigate",
            PhaseKind::ScorePayload => "score_payload",
            PhaseKind::Park => "park",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What the sequencer does when a phase fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Abort,
    Continue,
}

/// Result of a single phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum PhaseOutcome {
    Success,
    Failed(String),
    Skipped,
    /// The host stopped the match while this phase was running.
    Cancelled,
}

impl PhaseOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseOutcome::Success => "success",
            PhaseOutcome::Failed(_) => "failed",
            PhaseOutcome::Skipped => "skipped",
            PhaseOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
