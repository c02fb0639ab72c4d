use std::collections::VecDeque;

use async_trait::async_trait;
use relic_core::capability::{ActuatorFault, ColorSensor, Drivetrain, Servo, Settle};
use relic_core::config::{KnockerConfig, SamplingConfig};
use relic_core::types::{
    AllianceColor, ClassificationResult, ColorSample, KnockDirection, TeamIdentity,
};

use super::*;

const RAISED: f64 = 0.0;
const LOWERED: f64 = 0.85;

#[derive(Default)]
struct MockArm {
    commands: Vec<f64>,
    fail_on: Option<f64>,
}

#[async_trait]
impl Servo for MockArm {
    async fn set_position(&mut self, position: f64) -> Result<(), ActuatorFault> {
        self.commands.push(position);
        if self.fail_on == Some(position) {
            return Err(ActuatorFault::Rejected("stalled".into()));
        }
        Ok(())
    }

    async fn await_in_position(&mut self) -> Result<(), ActuatorFault> {
        Ok(())
    }
}

struct MockSensor {
    samples: VecDeque<Option<ColorSample>>,
    reads: usize,
}

impl MockSensor {
    fn new(samples: Vec<Option<ColorSample>>) -> Self {
        Self {
            samples: samples.into(),
            reads: 0,
        }
    }

    fn repeating(sample: ColorSample, n: usize) -> Self {
        Self::new(vec![Some(sample); n])
    }
}

#[async_trait]
impl ColorSensor for MockSensor {
    async fn read(&mut self) -> Option<ColorSample> {
        self.reads += 1;
        self.samples.pop_front().flatten()
    }
}

#[derive(Default)]
struct MockDrive {
    nudges: Vec<(KnockDirection, f64)>,
    fail: bool,
}

#[async_trait]
impl Drivetrain for MockDrive {
    async fn nudge(&mut self, direction: KnockDirection, power: f64) -> Result<(), ActuatorFault> {
        if self.fail {
            return Err(ActuatorFault::Disconnected);
        }
        self.nudges.push((direction, power));
        Ok(())
    }
}

fn config(samples: u32) -> KnockerConfig {
    KnockerConfig {
        raised_position: RAISED,
        lowered_position: LOWERED,
        settle: Settle::Timed { millis: 100 },
        sampling: SamplingConfig {
            samples,
            interval_ms: 10,
        },
        knock_power: 0.5,
        ..KnockerConfig::default()
    }
}

fn knocker<'a>(
    arm: &'a mut MockArm,
    sensor: &'a mut MockSensor,
    drive: &'a mut MockDrive,
    samples: u32,
) -> MarkerKnocker<'a> {
    MarkerKnocker::new(
        KnockerIo { arm, sensor, drive },
        &config(samples),
        AllianceColor::Red,
        0.9,
    )
    .expect("knocker")
}

fn raise_count(arm: &MockArm) -> usize {
    arm.commands.iter().filter(|p| **p == RAISED).count()
}

#[tokio::test(start_paused = true)]
async fn removes_opposing_jewel_under_sensor() {
    let mut arm = MockArm::default();
    let mut sensor = MockSensor::repeating(ColorSample::new(15.0, 190.0), 3);
    let mut drive = MockDrive::default();

    let report = {
        let mut k = knocker(&mut arm, &mut sensor, &mut drive, 3);
        let report = k.run(TeamIdentity::OpposingSide).await.expect("run");
        assert_eq!(k.state(), KnockerState::ArmRaised);
        assert!(!k.arm_extended());
        report
    };

    // Red alliance: blue jewel is the opponent's, and it is under the sensor.
    assert_eq!(
        report.classification,
        ClassificationResult::Identified(TeamIdentity::OpposingSide)
    );
    assert_eq!(report.action, KnockAction::Knocked(KnockDirection::Forward));
    assert_eq!(arm.commands, vec![LOWERED, RAISED]);
    assert_eq!(drive.nudges.len(), 1);
    assert!((drive.nudges[0].1 - 0.45).abs() < 1e-9, "knock power is scaled");
    assert_eq!(sensor.reads, 3);
}

#[tokio::test(start_paused = true)]
async fn own_jewel_under_sensor_knocks_the_other_way() {
    let mut arm = MockArm::default();
    let mut sensor = MockSensor::repeating(ColorSample::new(200.0, 10.0), 1);
    let mut drive = MockDrive::default();

    let report = knocker(&mut arm, &mut sensor, &mut drive, 1)
        .run(TeamIdentity::OpposingSide)
        .await
        .expect("run");

    assert_eq!(report.action, KnockAction::Knocked(KnockDirection::Backward));
}

#[tokio::test(start_paused = true)]
async fn lower_fault_skips_detection_but_still_raises() {
    let mut arm = MockArm {
        fail_on: Some(LOWERED),
        ..MockArm::default()
    };
    let mut sensor = MockSensor::repeating(ColorSample::new(200.0, 10.0), 5);
    let mut drive = MockDrive::default();

    let err = {
        let mut k = knocker(&mut arm, &mut sensor, &mut drive, 5);
        let err = k.run(TeamIdentity::OpposingSide).await.unwrap_err();
        assert!(!k.arm_extended(), "best-effort raise succeeded");
        err
    };

    assert!(matches!(
        err,
        KnockerError::Actuator {
            step: KnockStep::LowerArm,
            ..
        }
    ));
    assert_eq!(sensor.reads, 0, "detect must not run");
    assert!(drive.nudges.is_empty(), "remove_jewel must not run");
    assert_eq!(raise_count(&arm), 1);
}

#[tokio::test(start_paused = true)]
async fn indeterminate_read_moves_nothing() {
    let mut arm = MockArm::default();
    let mut sensor = MockSensor::repeating(ColorSample::new(100.0, 95.0), 3);
    let mut drive = MockDrive::default();

    let report = knocker(&mut arm, &mut sensor, &mut drive, 3)
        .run(TeamIdentity::OpposingSide)
        .await
        .expect("indeterminate is not an error");

    assert_eq!(report.classification, ClassificationResult::Indeterminate);
    assert_eq!(report.action, KnockAction::Skipped);
    assert!(drive.nudges.is_empty());
    assert_eq!(raise_count(&arm), 1);
}

#[tokio::test(start_paused = true)]
async fn absent_readings_are_indeterminate() {
    let mut arm = MockArm::default();
    let mut sensor = MockSensor::new(vec![None, None, Some(ColorSample::new(200.0, 1.0))]);
    let mut drive = MockDrive::default();

    let report = knocker(&mut arm, &mut sensor, &mut drive, 3)
        .run(TeamIdentity::OpposingSide)
        .await
        .expect("run");

    assert_eq!(report.action, KnockAction::Skipped);
}

#[tokio::test(start_paused = true)]
async fn drive_fault_still_raises_once() {
    let mut arm = MockArm::default();
    let mut sensor = MockSensor::repeating(ColorSample::new(200.0, 10.0), 1);
    let mut drive = MockDrive {
        fail: true,
        ..MockDrive::default()
    };

    let err = knocker(&mut arm, &mut sensor, &mut drive, 1)
        .run(TeamIdentity::OpposingSide)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        KnockerError::Actuator {
            step: KnockStep::RemoveJewel,
            ..
        }
    ));
    assert_eq!(raise_count(&arm), 1);
}

#[tokio::test(start_paused = true)]
async fn raise_fault_leaves_arm_flagged_extended() {
    let mut arm = MockArm {
        fail_on: Some(RAISED),
        ..MockArm::default()
    };
    let mut sensor = MockSensor::repeating(ColorSample::new(200.0, 10.0), 1);
    let mut drive = MockDrive::default();

    let mut k = knocker(&mut arm, &mut sensor, &mut drive, 1);
    let err = k.run(TeamIdentity::OpposingSide).await.unwrap_err();
    assert!(matches!(
        err,
        KnockerError::Actuator {
            step: KnockStep::RaiseArm,
            ..
        }
    ));
    assert!(k.arm_extended());
    assert_eq!(k.state(), KnockerState::Faulted);
}

#[tokio::test(start_paused = true)]
async fn steps_out_of_order_are_rejected() {
    let mut arm = MockArm::default();
    let mut sensor = MockSensor::repeating(ColorSample::new(200.0, 10.0), 1);
    let mut drive = MockDrive::default();

    let mut k = knocker(&mut arm, &mut sensor, &mut drive, 1);
    assert!(matches!(
        k.detect().await,
        Err(KnockerError::InvalidTransition {
            step: KnockStep::Detect,
            state: KnockerState::ArmRaised
        })
    ));
    assert!(k.remove_jewel(true).await.is_err());
    k.lower_arm().await.expect("lower");
    assert!(k.lower_arm().await.is_err(), "cannot lower twice");
}

#[test]
fn toward_detected_matches_removal_target() {
    assert!(toward_detected(TeamIdentity::OpposingSide, TeamIdentity::OpposingSide));
    assert!(!toward_detected(TeamIdentity::OwnSide, TeamIdentity::OpposingSide));
    assert!(toward_detected(TeamIdentity::OwnSide, TeamIdentity::OwnSide));
}
