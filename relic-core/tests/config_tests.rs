//! Config load errors, plan validation rules, and atomic save.

use std::fs;

use relic_core::{
    config::{self, AutonomousConfig, PhaseEntry},
    ConfigError, FailurePolicy, PhaseKind,
};
use rstest::rstest;
use tempfile::TempDir;

fn write_config(home: &TempDir, contents: &str) {
    let dir = home.path().join(".relic");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("autonomous.yaml"), contents).expect("write");
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_not_found() {
    let home = TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("autonomous.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, ": : corrupt : yaml : !!!\n  - broken: [unclosed");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("autonomous.yaml"));
}

#[test]
fn unknown_phase_name_is_a_parse_error() {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, "plan:\n  - phase: dance\n    timeout_ms: 100\n");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn out_of_range_margin_is_rejected_on_load() {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, "knocker:\n  margin: 1.5\n");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(err.to_string().contains("margin"), "got: {err}");
}

#[test]
fn partial_document_keeps_defaults() {
    let home = TempDir::new().expect("tempdir");
    write_config(
        &home,
        "alliance: blue\nhardware:\n  motor_power: 0.5\nknocker:\n  margin: 0.25\n",
    );
    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded.alliance, relic_core::AllianceColor::Blue);
    assert_eq!(loaded.hardware.motor_power, 0.5);
    assert_eq!(loaded.knocker.margin.value(), 0.25);
    assert_eq!(loaded.hardware.devices.knocker_arm, "knockerArm");
    assert_eq!(loaded.plan.len(), 7);
}

// ---------------------------------------------------------------------------
// 2. Validation
// ---------------------------------------------------------------------------

#[rstest]
#[case(0.0)]
#[case(-0.5)]
#[case(1.2)]
fn motor_power_must_be_a_scale(#[case] power: f64) {
    let mut cfg = AutonomousConfig::default();
    cfg.hardware.motor_power = power;
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("hardware.motor_power"), "got: {err}");
}

#[test]
fn plan_without_start_gate_is_rejected() {
    let mut cfg = AutonomousConfig::default();
    cfg.plan.retain(|entry| entry.phase != PhaseKind::AwaitStart);
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("await_start"), "got: {err}");
}

#[test]
fn motion_before_start_gate_is_rejected() {
    let mut cfg = AutonomousConfig::default();
    cfg.plan = vec![
        PhaseEntry::new(PhaseKind::KnockJewel, 1_000),
        PhaseEntry::new(PhaseKind::AwaitStart, 1_000),
    ];
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("knock_jewel"), "got: {err}");
}

#[test]
fn duplicate_phase_is_rejected() {
    let mut cfg = AutonomousConfig::default();
    cfg.plan.push(PhaseEntry::new(PhaseKind::Park, 1_000));
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("listed twice"), "got: {err}");
}

#[test]
fn zero_timeout_is_rejected() {
    let mut cfg = AutonomousConfig::default();
    cfg.plan[2].timeout_ms = 0;
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn yaml_plan_order_and_policies_survive() {
    let cfg = config::parse_str(
        "plan:\n\
         \x20 - phase: await_start\n\
         \x20   timeout_ms: 500\n\
         \x20 - phase: park\n\
         \x20   timeout_ms: 900\n\
         \x20   on_failure: abort\n",
    )
    .expect("parse");
    let plan = relic_core::AutonomousPlan::from_config(&cfg).expect("plan");
    let kinds: Vec<_> = plan.phases().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PhaseKind::AwaitStart, PhaseKind::Park]);
    assert_eq!(plan.phases()[1].on_failure, FailurePolicy::Abort);
}

// ---------------------------------------------------------------------------
// 3. Save / init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_defaults_and_is_idempotent() {
    let home = TempDir::new().expect("tempdir");
    let first = config::init_at(home.path(), false).expect("init");
    assert!(config::config_path_at(home.path()).exists());

    let mut edited = first.clone();
    edited.hardware.motor_power = 0.4;
    config::save_at(home.path(), &edited).expect("save");

    let again = config::init_at(home.path(), false).expect("init again");
    assert_eq!(again.hardware.motor_power, 0.4, "existing file must be kept");

    let forced = config::init_at(home.path(), true).expect("force");
    assert_eq!(forced.hardware.motor_power, 0.9);
}

#[test]
fn save_cleans_up_tmp_file() {
    let home = TempDir::new().expect("tempdir");
    let path = config::save_at(home.path(), &AutonomousConfig::default()).expect("save");
    let tmp = path.with_file_name("autonomous.yaml.tmp");
    assert!(!tmp.exists(), ".tmp must be removed after successful save");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[test]
fn save_refuses_invalid_config() {
    let home = TempDir::new().expect("tempdir");
    let mut cfg = AutonomousConfig::default();
    cfg.plan.clear();
    assert!(config::save_at(home.path(), &cfg).is_err());
    assert!(!config::config_path_at(home.path()).exists());
}
