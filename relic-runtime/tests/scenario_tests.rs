use std::fs;

use relic_core::types::VuMark;
use relic_runtime::{load_scenario, RuntimeError, Scenario};
use tempfile::TempDir;

#[test]
fn loads_scenario_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("match.yaml");
    fs::write(
        &path,
        "samples:\n  - { red: 200, blue: 10 }\n  - { red: 190, blue: 12 }\nvumark: right\nnavigation_ms: 900\nfaults:\n  knocker_raise: true\n",
    )
    .expect("write");

    let scenario = load_scenario(&path).expect("load");
    assert_eq!(scenario.samples.len(), 2);
    assert_eq!(scenario.vumark, Some(VuMark::Right));
    assert_eq!(scenario.navigation_ms, 900);
    assert!(scenario.faults.knocker_raise);
    assert_eq!(scenario.servo_ms, Scenario::default().servo_ms);
}

#[test]
fn empty_scenario_file_is_default() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("empty.yaml");
    fs::write(&path, "\n").expect("write");
    assert_eq!(load_scenario(&path).expect("load"), Scenario::default());
}

#[test]
fn malformed_scenario_names_the_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "samples: [not, a, sample\n").expect("write");

    let err = load_scenario(&path).unwrap_err();
    assert!(matches!(err, RuntimeError::Scenario { .. }));
    assert!(err.to_string().contains("bad.yaml"));
}

#[test]
fn missing_scenario_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_scenario(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, RuntimeError::Io { .. }));
}
