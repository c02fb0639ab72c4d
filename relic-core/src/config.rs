//! YAML configuration for the autonomous routine, and the plan built from it.
//!
//! # Storage layout
//!
//! ```text
//! ~/.relic/
//!   autonomous.yaml   (mode 0600, written by `relic config init`)
//! ```
//!
//! # API pattern
//!
//! Every filesystem function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Every key has a default, so an empty document is a valid configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::Settle;
use crate::error::{invalid, ConfigError};
use crate::types::{
    AllianceColor, FailurePolicy, KnockDirection, PhaseKind, Pose, TeamIdentity, Threshold, VuMark,
};

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_FILE: &str = "autonomous.yaml";

// ---------------------------------------------------------------------------
// 1. Configuration document
// ---------------------------------------------------------------------------

/// Root of `autonomous.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomousConfig {
    pub version: u32,
    pub routine: RoutineConfig,
    pub alliance: AllianceColor,
    pub hardware: HardwareConfig,
    pub clamp: ClampConfig,
    pub knocker: KnockerConfig,
    pub navigation: NavigationConfig,
    pub safety: SafetyConfig,
    pub plan: Vec<PhaseEntry>,
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            routine: RoutineConfig::default(),
            alliance: AllianceColor::default(),
            hardware: HardwareConfig::default(),
            clamp: ClampConfig::default(),
            knocker: KnockerConfig::default(),
            navigation: NavigationConfig::default(),
            safety: SafetyConfig::default(),
            plan: default_plan(),
        }
    }
}

/// Display name and group the routine is registered under with the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutineConfig {
    pub name: String,
    pub group: String,
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            name: "Autonomous Main".to_string(),
            group: "Pragmaticos".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Scale factor applied to every drive power, in (0, 1].
    pub motor_power: f64,
    pub devices: DeviceNames,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            motor_power: 0.9,
            devices: DeviceNames::default(),
        }
    }
}

/// Names under which the host's device map exposes each device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceNames {
    pub clamp_left: String,
    pub clamp_right: String,
    pub knocker_arm: String,
    pub jewel_color: String,
    pub drivetrain: String,
    pub marker_reader: String,
}

impl Default for DeviceNames {
    fn default() -> Self {
        Self {
            clamp_left: "clampLeft".to_string(),
            clamp_right: "clampRight".to_string(),
            knocker_arm: "knockerArm".to_string(),
            jewel_color: "jewelColor".to_string(),
            drivetrain: "drivetrain".to_string(),
            marker_reader: "vuMark".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClampConfig {
    pub closed_position: f64,
    pub open_position: f64,
    pub settle: Settle,
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            closed_position: 1.0,
            open_position: 0.0,
            settle: Settle::Timed { millis: 400 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnockerConfig {
    pub raised_position: f64,
    pub lowered_position: f64,
    pub settle: Settle,
    pub sampling: SamplingConfig,
    pub margin: Threshold,
    /// Channel reading at or above which the sensor is considered saturated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    /// Which way the drivetrain moves to push the jewel the sensor looks at.
    pub sensor_facing: KnockDirection,
    /// Whose jewel gets knocked off the stand.
    pub remove: TeamIdentity,
    /// Knock power before the hardware motor-power scale is applied.
    pub knock_power: f64,
}

impl Default for KnockerConfig {
    fn default() -> Self {
        Self {
            raised_position: 0.0,
            lowered_position: 0.85,
            settle: Settle::Confirmed { timeout_ms: 800 },
            sampling: SamplingConfig::default(),
            margin: Threshold::default(),
            saturation: None,
            sensor_facing: KnockDirection::Forward,
            remove: TeamIdentity::OpposingSide,
            knock_power: 0.3,
        }
    }
}

/// `samples == 1` is single-sample mode; larger values take a majority vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub samples: u32,
    pub interval_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 5,
            interval_ms: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub columns: ColumnPoses,
    /// Column used when no VuMark was decoded.
    pub default_column: VuMark,
    pub park: Pose,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            columns: ColumnPoses::default(),
            default_column: VuMark::Center,
            park: Pose::new(600.0, 900.0, 90.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnPoses {
    pub left: Pose,
    pub center: Pose,
    pub right: Pose,
}

impl ColumnPoses {
    pub fn pose_for(&self, column: VuMark) -> Pose {
        match column {
            VuMark::Left => self.left,
            VuMark::Center => self.center,
            VuMark::Right => self.right,
        }
    }
}

impl Default for ColumnPoses {
    fn default() -> Self {
        Self {
            left: Pose::new(760.0, 300.0, 90.0),
            center: Pose::new(950.0, 300.0, 90.0),
            right: Pose::new(1140.0, 300.0, 90.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Upper bound for each best-effort retraction during unwinding.
    pub retract_timeout_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            retract_timeout_ms: 1000,
        }
    }
}

/// One plan entry as written in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub phase: PhaseKind,
    pub timeout_ms: u64,
    /// Falls back to [`PhaseKind::default_policy`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicy>,
}

impl PhaseEntry {
    pub const fn new(phase: PhaseKind, timeout_ms: u64) -> Self {
        Self {
            phase,
            timeout_ms,
            on_failure: None,
        }
    }
}

pub fn default_plan() -> Vec<PhaseEntry> {
    vec![
        PhaseEntry::new(PhaseKind::SecurePayload, 1_500),
        PhaseEntry::new(PhaseKind::AwaitStart, 30_000),
        PhaseEntry::new(PhaseKind::ReadMarker, 2_000),
        PhaseEntry::new(PhaseKind::KnockJewel, 5_000),
        PhaseEntry::new(PhaseKind::Navigate, 8_000),
        PhaseEntry::new(PhaseKind::ScorePayload, 2_000),
        PhaseEntry::new(PhaseKind::Park, 5_000),
    ]
}

// ---------------------------------------------------------------------------
// 2. Validation and plan construction
// ---------------------------------------------------------------------------

/// A phase with its resolved time budget and failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPhase {
    pub kind: PhaseKind,
    pub max_duration: Duration,
    pub on_failure: FailurePolicy,
}

/// Ordered, immutable list of phases for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutonomousPlan {
    phases: Vec<PlannedPhase>,
}

impl AutonomousPlan {
    /// Build the plan from validated configuration.
    pub fn from_config(config: &AutonomousConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_entries_unchecked(&config.plan))
    }

    fn from_entries_unchecked(entries: &[PhaseEntry]) -> Self {
        let phases = entries
            .iter()
            .map(|entry| PlannedPhase {
                kind: entry.phase,
                max_duration: Duration::from_millis(entry.timeout_ms),
                on_failure: entry.on_failure.unwrap_or(entry.phase.default_policy()),
            })
            .collect();
        Self { phases }
    }

    pub fn phases(&self) -> &[PlannedPhase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl AutonomousConfig {
    /// Check ranges and plan safety rules. Called by every load path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(invalid(
                "version",
                format!("unsupported version {} (expected {CONFIG_VERSION})", self.version),
            ));
        }

        let power = self.hardware.motor_power;
        if !(power > 0.0 && power <= 1.0) {
            return Err(invalid("hardware.motor_power", format!("{power} is outside (0, 1]")));
        }

        for (field, value) in [
            ("clamp.closed_position", self.clamp.closed_position),
            ("clamp.open_position", self.clamp.open_position),
            ("knocker.raised_position", self.knocker.raised_position),
            ("knocker.lowered_position", self.knocker.lowered_position),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("servo position {value} is outside [0, 1]")));
            }
        }

        if self.knocker.sampling.samples == 0 {
            return Err(invalid("knocker.sampling.samples", "at least one sample is required"));
        }
        let knock = self.knocker.knock_power;
        if !(knock > 0.0 && knock <= 1.0) {
            return Err(invalid("knocker.knock_power", format!("{knock} is outside (0, 1]")));
        }
        if let Some(limit) = self.knocker.saturation {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(invalid("knocker.saturation", "must be a positive reading"));
            }
        }
        if self.safety.retract_timeout_ms == 0 {
            return Err(invalid("safety.retract_timeout_ms", "must be greater than zero"));
        }

        validate_plan(&self.plan)
    }
}

fn validate_plan(plan: &[PhaseEntry]) -> Result<(), ConfigError> {
    if plan.is_empty() {
        return Err(invalid("plan", "plan has no phases"));
    }

    let mut seen = HashSet::new();
    for entry in plan {
        if !seen.insert(entry.phase) {
            return Err(invalid("plan", format!("phase `{}` listed twice", entry.phase)));
        }
        if entry.timeout_ms == 0 {
            return Err(invalid(
                "plan",
                format!("phase `{}` needs a timeout greater than zero", entry.phase),
            ));
        }
    }

    // No motion before the host says go; only the clamp may close early.
    let start = plan
        .iter()
        .position(|entry| entry.phase == PhaseKind::AwaitStart)
        .ok_or_else(|| invalid("plan", "`await_start` is required"))?;
    if let Some(early) = plan[..start]
        .iter()
        .find(|entry| entry.phase != PhaseKind::SecurePayload)
    {
        return Err(invalid(
            "plan",
            format!("phase `{}` would move the robot before `await_start`", early.phase),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.relic/`
pub fn relic_root(home: &Path) -> PathBuf {
    home.join(".relic")
}

/// `<home>/.relic/autonomous.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    relic_root(home).join(CONFIG_FILE)
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 4. Load
// ---------------------------------------------------------------------------

/// Load and validate a config file at an explicit path.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_file(path: &Path) -> Result<AutonomousConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    parse_str(&contents).map_err(|err| match err {
        ConfigError::Yaml(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parse and validate a YAML document.
pub fn parse_str(contents: &str) -> Result<AutonomousConfig, ConfigError> {
    let config: AutonomousConfig = if contents.trim().is_empty() {
        AutonomousConfig::default()
    } else {
        serde_yaml::from_str(contents)?
    };
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.relic/autonomous.yaml`.
pub fn load_at(home: &Path) -> Result<AutonomousConfig, ConfigError> {
    load_file(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<AutonomousConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 5. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a validated config to `<home>/.relic/autonomous.yaml`.
///
/// Write flow: validate → serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &AutonomousConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;
    let root = relic_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name(format!("{CONFIG_FILE}.tmp"));

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &AutonomousConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

/// Write the default config unless one exists (or `force` is set).
///
/// Idempotent: an existing file is loaded and returned unchanged.
pub fn init_at(home: &Path, force: bool) -> Result<AutonomousConfig, ConfigError> {
    let path = config_path_at(home);
    if path.exists() && !force {
        return load_file(&path);
    }
    let config = AutonomousConfig::default();
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init(force: bool) -> Result<AutonomousConfig, ConfigError> {
    init_at(&home()?, force)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
