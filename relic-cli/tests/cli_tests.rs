use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn relic_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("relic"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "warn");
    cmd
}

/// Short settle and travel times so a full simulated match takes well under
/// a second of wall time.
fn write_fast_match(dir: &Path, scenario_extra: &str) -> (PathBuf, PathBuf) {
    let config = dir.join("fast.yaml");
    fs::write(
        &config,
        "clamp:\n  settle: { mode: timed, millis: 5 }\n\
         knocker:\n  settle: { mode: timed, millis: 5 }\n  sampling: { samples: 1, interval_ms: 0 }\n",
    )
    .expect("write config");
    let scenario = dir.join("scenario.yaml");
    fs::write(
        &scenario,
        format!("navigation_ms: 10\nservo_ms: 5\nvumark: right\n{scenario_extra}"),
    )
    .expect("write scenario");
    (config, scenario)
}

fn run_json(home: &TempDir, config: &Path, scenario: &Path) -> (bool, serde_json::Value) {
    let output = relic_cmd(home.path())
        .args(["run", "--json", "--config"])
        .arg(config)
        .arg("--scenario")
        .arg(scenario)
        .output()
        .expect("run relic");
    let report = serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");
    (output.status.success(), report)
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_init_writes_defaults_once() {
    let home = TempDir::new().expect("home");

    relic_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("Wrote default config"));
    let path = home.path().join(".relic/autonomous.yaml");
    let written = fs::read_to_string(&path).expect("config written");
    assert!(written.contains("Autonomous Main"));

    relic_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("already present"));
}

#[test]
fn config_check_prints_the_plan() {
    let home = TempDir::new().expect("home");
    relic_cmd(home.path())
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(contains("Config valid"))
        .stdout(contains("knock_jewel"))
        .stdout(contains("abort"));
}

#[test]
fn config_check_rejects_motion_before_start() {
    let home = TempDir::new().expect("home");
    let path = home.path().join("bad.yaml");
    fs::write(
        &path,
        "plan:\n  - { phase: navigate, timeout_ms: 1000 }\n  - { phase: await_start, timeout_ms: 1000 }\n",
    )
    .expect("write");

    relic_cmd(home.path())
        .args(["config", "check", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("before `await_start`"));
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

#[test]
fn classify_clear_red_on_red_alliance_is_own() {
    let home = TempDir::new().expect("home");
    relic_cmd(home.path())
        .args(["classify", "--red", "200", "--blue", "10"])
        .assert()
        .success()
        .stdout(contains("OWN"));
}

#[test]
fn classify_close_reading_is_indeterminate() {
    let home = TempDir::new().expect("home");
    relic_cmd(home.path())
        .args(["classify", "--red", "100", "--blue", "95"])
        .assert()
        .success()
        .stdout(contains("INDETERMINATE"))
        .stdout(contains("BelowMargin"));
}

#[test]
fn classify_json_respects_alliance() {
    let home = TempDir::new().expect("home");
    let output = relic_cmd(home.path())
        .args(["classify", "--red", "200", "--blue", "10", "--alliance", "blue", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["result"], "identified");
    assert_eq!(json["side"], "opposing_side");
    assert_eq!(json["alliance"], "blue");
}

#[test]
fn classify_rejects_out_of_range_margin() {
    let home = TempDir::new().expect("home");
    relic_cmd(home.path())
        .args(["classify", "--red", "1", "--blue", "2", "--margin", "1.5"])
        .assert()
        .failure()
        .stderr(contains("invalid --margin"));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_reports_completed_match_as_json() {
    let home = TempDir::new().expect("home");
    let (config, scenario) = write_fast_match(home.path(), "");
    let (ok, report) = run_json(&home, &config, &scenario);

    assert!(ok);
    assert_eq!(report["status"]["kind"], "completed");
    assert_eq!(report["vumark"], "right");
    assert_eq!(report["phases"].as_array().map(Vec::len), Some(7));
    assert_eq!(report["phases"][3]["phase"], "knock_jewel");
    assert_eq!(report["phases"][3]["outcome"], "success");
}

#[test]
fn run_with_missing_device_fails_init() {
    let home = TempDir::new().expect("home");
    let (config, scenario) = write_fast_match(home.path(), "missing: [clampLeft]\n");
    let (ok, report) = run_json(&home, &config, &scenario);

    assert!(!ok, "init failure exits non-zero");
    assert_eq!(report["status"]["kind"], "init_failed");
    assert!(report["phases"]
        .as_array()
        .expect("phases")
        .iter()
        .all(|p| p["outcome"] == "skipped"));
}

#[test]
fn run_table_lists_phases() {
    let home = TempDir::new().expect("home");
    let (config, scenario) = write_fast_match(home.path(), "faults: { navigation: true }\n");
    relic_cmd(home.path())
        .args(["run", "--config"])
        .arg(&config)
        .arg("--scenario")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(contains("COMPLETED WITH FAILURES"))
        .stdout(contains("lost localization"))
        .stdout(contains("VuMark: right"));
}
