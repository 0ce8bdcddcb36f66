//! Bucket servo driver.
//!
//! Maps a class label to a bucket angle, the angle to a servo pulse width,
//! and the pulse width to a duty fraction of the servo frame period. After
//! commanding a position the driver waits out the settle time, so callers
//! can assume the bucket is in place when `rotate_to` returns.
//!
//! ## Pulse mapping
//!
//! ```text
//!   0°  ──▶ min_pulse_us   (500 µs)
//!  90°  ──▶ midpoint       (1500 µs)
//! 180°  ──▶ max_pulse_us   (2500 µs)
//! ```

use core::time::Duration;

use embedded_hal::pwm::SetDutyCycle;
use log::debug;

use crate::classes::{ClassLabel, ClassTable, MAX_ANGLE_DEG, MIN_ANGLE_DEG};
use crate::config::ServoConfig;
use crate::error::{ActuatorError, ConfigError, Error, Result};

// ---------------------------------------------------------------------------
// Pulse width
// ---------------------------------------------------------------------------

/// High time of one servo frame, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PulseWidth(pub u32);

impl PulseWidth {
    pub fn as_micros(self) -> u32 {
        self.0
    }
}

/// Linear angle ↔ pulse-width mapping over the servo's full range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseMap {
    min_us: u32,
    max_us: u32,
}

impl PulseMap {
    /// `min_us` must be below `max_us`; [`SorterConfig::validate`] enforces
    /// this for configured maps.
    ///
    /// [`SorterConfig::validate`]: crate::config::SorterConfig::validate
    pub const fn new(min_us: u32, max_us: u32) -> Self {
        Self { min_us, max_us }
    }

    pub fn from_config(config: &ServoConfig) -> Self {
        Self::new(config.min_pulse_us, config.max_pulse_us)
    }

    pub fn min(&self) -> PulseWidth {
        PulseWidth(self.min_us)
    }

    pub fn max(&self) -> PulseWidth {
        PulseWidth(self.max_us)
    }

    /// Pulse width for `angle_deg`, or `None` outside [0, 180].
    pub fn pulse_for_angle(&self, angle_deg: i16) -> Option<PulseWidth> {
        if !(MIN_ANGLE_DEG..=MAX_ANGLE_DEG).contains(&angle_deg) {
            return None;
        }
        let span = self.max_us - self.min_us;
        let full = MAX_ANGLE_DEG as u32;
        // Rounded integer division: min + angle * span / 180.
        let offset = (angle_deg as u32 * span + full / 2) / full;
        Some(PulseWidth(self.min_us + offset))
    }

    /// Inverse of [`pulse_for_angle`](Self::pulse_for_angle), clamped to
    /// the servo range.
    pub fn angle_for_pulse(&self, pulse: PulseWidth) -> f32 {
        let clamped = pulse.0.clamp(self.min_us, self.max_us);
        let span = (self.max_us - self.min_us) as f32;
        (clamped - self.min_us) as f32 * f32::from(MAX_ANGLE_DEG) / span
    }
}

impl Default for PulseMap {
    fn default() -> Self {
        Self::new(crate::pins::SERVO_MIN_PULSE_US, crate::pins::SERVO_MAX_PULSE_US)
    }
}

// ---------------------------------------------------------------------------
// Bucket actuator
// ---------------------------------------------------------------------------

/// Outcome of a completed bucket rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketMove {
    pub label: ClassLabel,
    pub angle_deg: i16,
    pub pulse: PulseWidth,
}

/// Rotates the dispensing bucket to the position of a class.
pub struct BucketActuator<S> {
    servo: S,
    map: PulseMap,
    period_us: u16,
    settle: Duration,
    classes: ClassTable,
    last_move: Option<BucketMove>,
}

impl<S: SetDutyCycle> BucketActuator<S> {
    pub fn new(servo: S, config: &ServoConfig, classes: ClassTable) -> Self {
        Self {
            servo,
            map: PulseMap::from_config(config),
            period_us: config.period_us.min(u32::from(u16::MAX)) as u16,
            settle: Duration::from_millis(config.settle_ms),
            classes,
            last_move: None,
        }
    }

    /// Look up the angle for `label`, command the servo, and wait for the
    /// bucket to settle.
    ///
    /// An unknown label or an angle outside [0, 180] fails before the servo
    /// is touched.
    pub async fn rotate_to(&mut self, label: ClassLabel) -> Result<BucketMove> {
        let target = self.resolve(label)?;

        self.command(target.pulse)?;
        debug!(
            "Bucket: label {} -> {}° ({} µs), settling {:?}",
            label, target.angle_deg, target.pulse.0, self.settle
        );
        async_io_mini::Timer::after(self.settle).await;

        self.last_move = Some(target);
        Ok(target)
    }

    /// Resolve `label` to its target without moving anything.
    pub fn resolve(&self, label: ClassLabel) -> Result<BucketMove> {
        let entry = self
            .classes
            .get(label)
            .ok_or(ConfigError::UnknownLabel(label))?;
        let angle_deg = entry.angle_deg;
        let pulse = self
            .map
            .pulse_for_angle(angle_deg)
            .ok_or(ConfigError::AngleOutOfRange { label, angle_deg })?;
        Ok(BucketMove {
            label,
            angle_deg,
            pulse,
        })
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn pulse_map(&self) -> PulseMap {
        self.map
    }

    pub fn settle_duration(&self) -> Duration {
        self.settle
    }

    pub fn last_move(&self) -> Option<BucketMove> {
        self.last_move
    }

    fn command(&mut self, pulse: PulseWidth) -> Result<()> {
        let high_us = pulse.0.min(u32::from(self.period_us)) as u16;
        self.servo
            .set_duty_cycle_fraction(high_us, self.period_us)
            .map_err(|_| Error::from(ActuatorError::PwmWriteFailed))
    }
}
