//! The hardware facade: every physical handle the routine needs, acquired in
//! one call and owned by the sequencer for the length of a run.

use relic_core::capability::{ColorSensor, DeviceMap, Drivetrain, MarkerReader, Servo};
use relic_core::config::HardwareConfig;
use relic_knocker::KnockerIo;

use crate::error::{DeviceKind, HardwareError};

pub struct HardwareFacade {
    clamp_left: Box<dyn Servo>,
    clamp_right: Box<dyn Servo>,
    knocker_arm: Box<dyn Servo>,
    jewel_color: Box<dyn ColorSensor>,
    drivetrain: Box<dyn Drivetrain>,
    marker_reader: Box<dyn MarkerReader>,
    motor_power: f64,
}

impl std::fmt::Debug for HardwareFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareFacade")
            .field("motor_power", &self.motor_power)
            .finish_non_exhaustive()
    }
}

impl HardwareFacade {
    /// Look up and self-test every device. Fails on the first missing or
    /// faulted device; commands nothing.
    pub fn acquire(
        devices: &mut dyn DeviceMap,
        config: &HardwareConfig,
    ) -> Result<Self, HardwareError> {
        let power = config.motor_power;
        if !(power > 0.0 && power <= 1.0) {
            return Err(HardwareError::InvalidPowerScale(power));
        }
        let names = &config.devices;

        let clamp_left = servo(devices, &names.clamp_left)?;
        let clamp_right = servo(devices, &names.clamp_right)?;
        let knocker_arm = servo(devices, &names.knocker_arm)?;

        let jewel_color = devices
            .color_sensor(&names.jewel_color)
            .ok_or_else(|| missing(DeviceKind::ColorSensor, &names.jewel_color))?;
        if !jewel_color.is_connected() {
            return Err(HardwareError::Faulted {
                kind: DeviceKind::ColorSensor,
                name: names.jewel_color.clone(),
                reason: "sensor not connected".to_string(),
            });
        }

        let drivetrain = devices
            .drivetrain(&names.drivetrain)
            .ok_or_else(|| missing(DeviceKind::Drivetrain, &names.drivetrain))?;
        drivetrain
            .self_test()
            .map_err(|fault| HardwareError::Faulted {
                kind: DeviceKind::Drivetrain,
                name: names.drivetrain.clone(),
                reason: fault.to_string(),
            })?;

        let marker_reader = devices
            .marker_reader(&names.marker_reader)
            .ok_or_else(|| missing(DeviceKind::MarkerReader, &names.marker_reader))?;

        tracing::info!(motor_power = power, "hardware acquired");
        Ok(Self {
            clamp_left,
            clamp_right,
            knocker_arm,
            jewel_color,
            drivetrain,
            marker_reader,
            motor_power: power,
        })
    }

    pub fn motor_power(&self) -> f64 {
        self.motor_power
    }

    /// Borrow the devices the jewel knocker drives.
    pub fn knocker_io(&mut self) -> KnockerIo<'_> {
        KnockerIo {
            arm: &mut *self.knocker_arm,
            sensor: &mut *self.jewel_color,
            drive: &mut *self.drivetrain,
        }
    }

    pub fn knocker_arm(&mut self) -> &mut dyn Servo {
        &mut *self.knocker_arm
    }

    pub fn clamps(&mut self) -> (&mut dyn Servo, &mut dyn Servo) {
        (&mut *self.clamp_left, &mut *self.clamp_right)
    }

    pub fn marker_reader(&mut self) -> &mut dyn MarkerReader {
        &mut *self.marker_reader
    }
}

fn servo(devices: &mut dyn DeviceMap, name: &str) -> Result<Box<dyn Servo>, HardwareError> {
    let servo = devices
        .servo(name)
        .ok_or_else(|| missing(DeviceKind::Servo, name))?;
    servo.self_test().map_err(|fault| HardwareError::Faulted {
        kind: DeviceKind::Servo,
        name: name.to_string(),
        reason: fault.to_string(),
    })?;
    Ok(servo)
}

fn missing(kind: DeviceKind, name: &str) -> HardwareError {
    HardwareError::Missing {
        kind,
        name: name.to_string(),
    }
}
