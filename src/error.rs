//! Unified error types for the sorter.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's failure handling uniform. Each variant carries enough
//! context to be logged as one diagnosable line before the loop stops.

use core::fmt;

use crate::classes::ClassLabel;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the sorter funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The camera produced no frame for this cycle.
    Capture(CaptureError),
    /// The classification link failed or was misused.
    Link(LinkError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// Configuration is invalid for the requested operation.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture(e) => write!(f, "capture: {e}"),
            Self::Link(e) => write!(f, "classifier link: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Capture errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The capture result was absent when the cycle needed a frame.
    NoImageCaptured,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImageCaptured => write!(f, "no image captured"),
        }
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Self::Capture(e)
    }
}

// ---------------------------------------------------------------------------
// Classifier link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A request was issued while another one was still outstanding.
    RequestInFlight,
    /// `wait` was called with a ticket that is not the outstanding request.
    UnknownTicket(u32),
    /// The peer closed the connection.
    Disconnected,
    /// Transport-level read/write failure.
    Io(String),
    /// An outbound event could not be encoded into a frame.
    Encode(String),
    /// The peer answered with something that is not a class label.
    BadLabel(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestInFlight => write!(f, "a classification request is already outstanding"),
            Self::UnknownTicket(id) => write!(f, "request {id} is not outstanding"),
            Self::Disconnected => write!(f, "peer disconnected"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Encode(msg) => write!(f, "encode failed: {msg}"),
            Self::BadLabel(raw) => write!(f, "not a class label: {raw}"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// A belt phase pin write failed.
    GpioWriteFailed { pin_index: usize },
    /// The servo duty-cycle write failed.
    PwmWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed { pin_index } => {
                write!(f, "GPIO write failed on belt phase {pin_index}")
            }
            Self::PwmWriteFailed => write!(f, "servo PWM write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Configuration-fatal conditions. These are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A class angle lies outside the servo range [0, 180].
    AngleOutOfRange { label: ClassLabel, angle_deg: i16 },
    /// The classifier returned a label that has no table entry.
    UnknownLabel(ClassLabel),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// The config file could not be read or parsed.
    Unreadable(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AngleOutOfRange { label, angle_deg } => {
                write!(f, "invalid angle {angle_deg} for label {label} (must be 0..=180)")
            }
            Self::UnknownLabel(label) => write!(f, "no class table entry for label {label}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Unreadable(msg) => write!(f, "unreadable: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
