//! Simulated robot: capability implementations driven by a YAML scenario.
//!
//! Every actuator command lands in a shared [`SimLog`], so callers can check
//! what physically would have happened.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relic_core::capability::{
    ActuatorFault, ColorSensor, DeviceMap, Drivetrain, MarkerReader, NavigationFault, Navigator,
    Servo,
};
use relic_core::config::AutonomousConfig;
use relic_core::types::{ColorSample, KnockDirection, Pose, VuMark};

use crate::error::{io_err, RuntimeError};

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Jewel sensor readings, replayed in order and then cycled.
    pub samples: Vec<ColorSample>,
    /// Marker the camera decodes; `None` never decodes.
    pub vumark: Option<VuMark>,
    /// Reads that return nothing before the marker is decoded.
    pub vumark_after_reads: u32,
    pub faults: Faults,
    /// Device names the map does not know about.
    pub missing: Vec<String>,
    pub navigation_ms: u64,
    pub servo_ms: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            samples: vec![ColorSample::new(30.0, 180.0)],
            vumark: Some(VuMark::Center),
            vumark_after_reads: 0,
            faults: Faults::default(),
            missing: Vec::new(),
            navigation_ms: 1_500,
            servo_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Faults {
    pub knocker_lower: bool,
    pub knocker_raise: bool,
    pub clamp_left: bool,
    pub clamp_right: bool,
    pub drivetrain: bool,
    pub navigation: bool,
    pub sensor_disconnected: bool,
}

/// Load a scenario file; an empty file is the default scenario.
pub fn load_scenario(path: &Path) -> Result<Scenario, RuntimeError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(Scenario::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| RuntimeError::Scenario {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Command log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Servo { device: String, position: f64 },
    Nudge { direction: KnockDirection, power: f64 },
    DriveTo(Pose),
    TurnBy(f64),
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct SimLog(Arc<Mutex<Vec<SimEvent>>>);

impl SimLog {
    fn push(&self, event: SimEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Positions commanded on one servo, in order.
    pub fn servo_positions(&self, device: &str) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SimEvent::Servo { device: d, position } if d == device => Some(position),
                _ => None,
            })
            .collect()
    }

    pub fn drives(&self) -> Vec<Pose> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SimEvent::DriveTo(pose) => Some(pose),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&SimEvent) -> bool) -> usize {
        self.events().iter().filter(|event| matches(event)).count()
    }
}

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// Builds the device map and navigator for one scenario.
#[derive(Debug, Clone)]
pub struct SimRobot {
    scenario: Scenario,
    config: AutonomousConfig,
    log: SimLog,
}

impl SimRobot {
    pub fn new(scenario: Scenario, config: &AutonomousConfig) -> Self {
        Self {
            scenario,
            config: config.clone(),
            log: SimLog::default(),
        }
    }

    pub fn log(&self) -> SimLog {
        self.log.clone()
    }

    pub fn device_map(&self) -> SimDeviceMap {
        SimDeviceMap {
            robot: self.clone(),
        }
    }

    pub fn navigator(&self) -> SimNavigator {
        SimNavigator {
            log: self.log.clone(),
            travel: Duration::from_millis(self.scenario.navigation_ms),
            fail: self.scenario.faults.navigation,
        }
    }

    fn is_missing(&self, name: &str) -> bool {
        self.scenario.missing.iter().any(|m| m == name)
    }
}

pub struct SimDeviceMap {
    robot: SimRobot,
}

impl DeviceMap for SimDeviceMap {
    fn servo(&mut self, name: &str) -> Option<Box<dyn Servo>> {
        let robot = &self.robot;
        if robot.is_missing(name) {
            return None;
        }
        let devices = &robot.config.hardware.devices;
        let faults = robot.scenario.faults;
        let mut fail_on = Vec::new();
        if name == devices.knocker_arm {
            if faults.knocker_lower {
                fail_on.push(robot.config.knocker.lowered_position);
            }
            if faults.knocker_raise {
                fail_on.push(robot.config.knocker.raised_position);
            }
        } else if (name == devices.clamp_left && faults.clamp_left)
            || (name == devices.clamp_right && faults.clamp_right)
        {
            fail_on.push(robot.config.clamp.closed_position);
            fail_on.push(robot.config.clamp.open_position);
        } else if name != devices.clamp_left && name != devices.clamp_right {
            return None;
        }
        Some(Box::new(SimServo {
            name: name.to_string(),
            log: robot.log.clone(),
            travel: Duration::from_millis(robot.scenario.servo_ms),
            fail_on,
        }))
    }

    fn color_sensor(&mut self, name: &str) -> Option<Box<dyn ColorSensor>> {
        let robot = &self.robot;
        if robot.is_missing(name) || name != robot.config.hardware.devices.jewel_color {
            return None;
        }
        Some(Box::new(SimColorSensor {
            samples: robot.scenario.samples.clone(),
            next: 0,
            connected: !robot.scenario.faults.sensor_disconnected,
        }))
    }

    fn drivetrain(&mut self, name: &str) -> Option<Box<dyn Drivetrain>> {
        let robot = &self.robot;
        if robot.is_missing(name) || name != robot.config.hardware.devices.drivetrain {
            return None;
        }
        Some(Box::new(SimDrivetrain {
            log: robot.log.clone(),
            fail: robot.scenario.faults.drivetrain,
        }))
    }

    fn marker_reader(&mut self, name: &str) -> Option<Box<dyn MarkerReader>> {
        let robot = &self.robot;
        if robot.is_missing(name) || name != robot.config.hardware.devices.marker_reader {
            return None;
        }
        Some(Box::new(SimMarkerReader {
            mark: robot.scenario.vumark,
            blank_reads: robot.scenario.vumark_after_reads,
        }))
    }
}

struct SimServo {
    name: String,
    log: SimLog,
    travel: Duration,
    fail_on: Vec<f64>,
}

#[async_trait]
impl Servo for SimServo {
    async fn set_position(&mut self, position: f64) -> Result<(), ActuatorFault> {
        self.log.push(SimEvent::Servo {
            device: self.name.clone(),
            position,
        });
        if self.fail_on.iter().any(|p| (p - position).abs() < f64::EPSILON) {
            return Err(ActuatorFault::Rejected(format!("{} stalled", self.name)));
        }
        Ok(())
    }

    async fn await_in_position(&mut self) -> Result<(), ActuatorFault> {
        tokio::time::sleep(self.travel).await;
        Ok(())
    }
}

struct SimColorSensor {
    samples: Vec<ColorSample>,
    next: usize,
    connected: bool,
}

#[async_trait]
impl ColorSensor for SimColorSensor {
    async fn read(&mut self) -> Option<ColorSample> {
        if self.samples.is_empty() {
            return None;
        }
        let sample = self.samples[self.next % self.samples.len()];
        self.next += 1;
        Some(sample)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

struct SimDrivetrain {
    log: SimLog,
    fail: bool,
}

#[async_trait]
impl Drivetrain for SimDrivetrain {
    async fn nudge(&mut self, direction: KnockDirection, power: f64) -> Result<(), ActuatorFault> {
        if self.fail {
            return Err(ActuatorFault::Disconnected);
        }
        self.log.push(SimEvent::Nudge { direction, power });
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(())
    }
}

struct SimMarkerReader {
    mark: Option<VuMark>,
    blank_reads: u32,
}

#[async_trait]
impl MarkerReader for SimMarkerReader {
    async fn read(&mut self) -> Option<VuMark> {
        if self.blank_reads > 0 {
            self.blank_reads -= 1;
            return None;
        }
        self.mark
    }
}

pub struct SimNavigator {
    log: SimLog,
    travel: Duration,
    fail: bool,
}

#[async_trait]
impl Navigator for SimNavigator {
    async fn drive_to(&mut self, pose: Pose) -> Result<(), NavigationFault> {
        self.log.push(SimEvent::DriveTo(pose));
        tokio::time::sleep(self.travel).await;
        if self.fail {
            return Err(NavigationFault("lost localization".to_string()));
        }
        Ok(())
    }

    async fn turn_by(&mut self, degrees: f64) -> Result<(), NavigationFault> {
        self.log.push(SimEvent::TurnBy(degrees));
        tokio::time::sleep(self.travel / 4).await;
        if self.fail {
            return Err(NavigationFault("lost localization".to_string()));
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.log.push(SimEvent::Stop);
    }
}
