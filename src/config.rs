//! System configuration parameters
//!
//! All tunable parameters for the sorter: belt stepper, bucket servo,
//! camera capture, classifier link, and the class table. Loaded from a
//! JSON file at startup; every field falls back to the calibrated
//! defaults of the reference rig.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classes::ClassTable;
use crate::error::ConfigError;
use crate::pins;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SORTER_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "sorter.json";

/// Direction the stepper's ring counter shifts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingDirection {
    /// Ring shift right: phase 3 → 2 → 1 → 0 → 3.
    TowardLower,
    /// Ring shift left: phase 0 → 1 → 2 → 3 → 0.
    TowardHigher,
}

/// Belt stepper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeltConfig {
    /// Phase output pins, in ring order.
    pub pins: [u8; 4],
    /// Phase-steps per belt increment (calibrated on the rig).
    pub steps_per_advance: u32,
    /// How long each phase stays energised (milliseconds).
    pub phase_hold_ms: u64,
    pub direction: RingDirection,
}

impl Default for BeltConfig {
    fn default() -> Self {
        Self {
            pins: pins::BELT_MOTOR_PINS,
            steps_per_advance: 5,
            phase_hold_ms: 10,
            direction: RingDirection::TowardLower,
        }
    }
}

/// Bucket servo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub pin: u8,
    /// Time for a full 0–180° traversal (milliseconds).
    pub settle_ms: u64,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub period_us: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pin: pins::SERVO_PIN,
            settle_ms: 2_000,
            min_pulse_us: pins::SERVO_MIN_PULSE_US,
            max_pulse_us: pins::SERVO_MAX_PULSE_US,
            period_us: pins::SERVO_PERIOD_US,
        }
    }
}

/// Camera capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Still-capture utility on `PATH`.
    pub program: String,
    pub width: u32,
    pub height: u32,
    /// Where the utility writes the frame.
    pub output_path: String,
    /// Reference sent to the classifier (web-relative path of the frame).
    pub reference: String,
    /// How often to poll the running utility for exit (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "raspistill".into(),
            width: 1000,
            height: 1000,
            output_path: "public/currentBlock.jpg".into(),
            reference: "/currentBlock.jpg".into(),
            poll_interval_ms: 20,
        }
    }
}

/// Classifier link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Address the sorter listens on for the classifier peer.
    pub listen_addr: String,
    /// Transport poll interval while waiting for a result (milliseconds).
    pub poll_interval_ms: u64,
    /// Mirror log lines to the classifier peer.
    pub mirror_logs: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            poll_interval_ms: 5,
            mirror_logs: true,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    pub belt: BeltConfig,
    pub servo: ServoConfig,
    pub capture: CaptureConfig,
    pub classifier: ClassifierConfig,
    pub classes: ClassTable,
}

impl SorterConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults; an unreadable
    /// or invalid one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Unreadable(format!("{}: {e}", path.display()))),
        }
    }

    /// Reject values that would make the rig misbehave. Invalid ranges are
    /// rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.belt.steps_per_advance == 0 {
            return Err(ConfigError::ValidationFailed("belt.steps_per_advance must be > 0"));
        }
        let pins = &self.belt.pins;
        if pins.iter().enumerate().any(|(i, p)| pins[i + 1..].contains(p)) {
            return Err(ConfigError::ValidationFailed("belt.pins must be distinct"));
        }
        if pins.contains(&self.servo.pin) {
            return Err(ConfigError::ValidationFailed("servo.pin collides with a belt pin"));
        }
        if self.servo.min_pulse_us >= self.servo.max_pulse_us {
            return Err(ConfigError::ValidationFailed("servo.min_pulse_us must be < max_pulse_us"));
        }
        if self.servo.max_pulse_us > self.servo.period_us {
            return Err(ConfigError::ValidationFailed("servo.max_pulse_us exceeds period_us"));
        }
        if self.servo.period_us > u32::from(u16::MAX) {
            return Err(ConfigError::ValidationFailed("servo.period_us must fit in 16 bits"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::ValidationFailed("capture resolution must be non-zero"));
        }
        if self.classes.is_empty() {
            return Err(ConfigError::ValidationFailed("class table is empty"));
        }
        if self.classes.has_duplicate_labels() {
            return Err(ConfigError::ValidationFailed("class table has duplicate labels"));
        }
        if let Some(bad) = self.classes.iter().find(|e| !e.angle_in_range()) {
            return Err(ConfigError::AngleOutOfRange {
                label: bad.label,
                angle_deg: bad.angle_deg,
            });
        }
        Ok(())
    }
}
