//! GPIO pin assignments for the sorter's Raspberry Pi header.
//!
//! Single source of truth for the default wiring; every default in
//! [`crate::config`] references this module rather than hard-coding
//! pin numbers. BCM numbering throughout.

// ---------------------------------------------------------------------------
// Belt stepper (28BYJ-48 via ULN2003 driver board)
// ---------------------------------------------------------------------------

/// Phase outputs IN1..IN4, in ring order. Phase `i` is energised by
/// driving `BELT_MOTOR_PINS[i]` high.
pub const BELT_MOTOR_PINS: [u8; 4] = [6, 13, 19, 26];

// ---------------------------------------------------------------------------
// Bucket servo
// ---------------------------------------------------------------------------

/// Software-PWM output driving the bucket servo signal line.
pub const SERVO_PIN: u8 = 1;

// ---------------------------------------------------------------------------
// Servo timing
// ---------------------------------------------------------------------------

/// Standard hobby-servo frame period (50 Hz).
pub const SERVO_PERIOD_US: u32 = 20_000;
/// Pulse width commanding 0°.
pub const SERVO_MIN_PULSE_US: u32 = 500;
/// Pulse width commanding 180°.
pub const SERVO_MAX_PULSE_US: u32 = 2_500;
