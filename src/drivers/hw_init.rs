//! One-shot hardware peripheral initialization.
//!
//! Claims the four belt phase outputs and the servo output, returning
//! handles that implement the `embedded-hal` traits the actuators are
//! generic over. Called once from `main()` before the sort loop starts;
//! the handles are then owned by their actuators for the process lifetime.
//!
//! ## Dual-target design
//!
//! With the `rpi` feature: Raspberry Pi GPIO through `rppal`, servo driven
//! by software PWM on an ordinary GPIO.
//! Otherwise: simulated pins that track level/duty in memory.

use core::convert::Infallible;

use log::{info, trace};

use crate::config::{BeltConfig, ServoConfig};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwInitError {
    GpioUnavailable(String),
    PinClaimFailed { pin: u8, reason: String },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioUnavailable(reason) => write!(f, "GPIO unavailable: {}", reason),
            Self::PinClaimFailed { pin, reason } => {
                write!(f, "failed to claim GPIO {}: {}", pin, reason)
            }
        }
    }
}

impl std::error::Error for HwInitError {}

// ── Simulated peripherals ─────────────────────────────────────

/// In-memory output pin.
#[derive(Debug)]
pub struct SimPin {
    pin: u8,
    high: bool,
}

impl SimPin {
    pub fn new(pin: u8) -> Self {
        Self { pin, high: false }
    }

    pub fn is_high(&self) -> bool {
        self.high
    }
}

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        trace!("gpio(sim) {} LOW", self.pin);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        trace!("gpio(sim) {} HIGH", self.pin);
        Ok(())
    }
}

/// In-memory servo PWM channel. One duty unit is one microsecond of the
/// servo frame period.
#[derive(Debug)]
pub struct SimServo {
    pin: u8,
    period_us: u16,
    duty: u16,
}

impl SimServo {
    pub fn new(pin: u8, period_us: u16) -> Self {
        Self {
            pin,
            period_us,
            duty: 0,
        }
    }

    /// Currently commanded pulse width in microseconds.
    pub fn pulse_us(&self) -> u16 {
        self.duty
    }
}

impl embedded_hal::pwm::ErrorType for SimServo {
    type Error = Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for SimServo {
    fn max_duty_cycle(&self) -> u16 {
        self.period_us
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duty = duty;
        trace!("pwm(sim) {} pulse {} µs / {} µs", self.pin, duty, self.period_us);
        Ok(())
    }
}

// ── Raspberry Pi peripherals ──────────────────────────────────

#[cfg(feature = "rpi")]
mod rpi {
    use core::convert::Infallible;
    use core::time::Duration;

    /// A claimed GPIO output.
    pub struct RpiPin(pub(super) rppal::gpio::OutputPin);

    impl embedded_hal::digital::ErrorType for RpiPin {
        type Error = Infallible;
    }

    impl embedded_hal::digital::OutputPin for RpiPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.set_low();
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set_high();
            Ok(())
        }
    }

    #[derive(Debug)]
    pub struct RpiPwmError(pub rppal::gpio::Error);

    impl embedded_hal::pwm::Error for RpiPwmError {
        fn kind(&self) -> embedded_hal::pwm::ErrorKind {
            embedded_hal::pwm::ErrorKind::Other
        }
    }

    /// Software-PWM servo output. One duty unit is one microsecond.
    pub struct RpiServo {
        pub(super) pin: rppal::gpio::OutputPin,
        pub(super) period_us: u16,
    }

    impl embedded_hal::pwm::ErrorType for RpiServo {
        type Error = RpiPwmError;
    }

    impl embedded_hal::pwm::SetDutyCycle for RpiServo {
        fn max_duty_cycle(&self) -> u16 {
            self.period_us
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), RpiPwmError> {
            let period = Duration::from_micros(u64::from(self.period_us));
            let pulse = Duration::from_micros(u64::from(duty.min(self.period_us)));
            self.pin.set_pwm(period, pulse).map_err(RpiPwmError)
        }
    }
}

#[cfg(feature = "rpi")]
pub use rpi::{RpiPin, RpiPwmError, RpiServo};

/// Output pin type driving the belt phases on this target.
#[cfg(feature = "rpi")]
pub type BeltPin = RpiPin;
#[cfg(not(feature = "rpi"))]
pub type BeltPin = SimPin;

/// PWM channel type driving the bucket servo on this target.
#[cfg(feature = "rpi")]
pub type ServoPwm = RpiServo;
#[cfg(not(feature = "rpi"))]
pub type ServoPwm = SimServo;

// ── Initialisation ────────────────────────────────────────────

#[cfg(feature = "rpi")]
pub fn init_belt_pins(config: &BeltConfig) -> Result<[BeltPin; 4], HwInitError> {
    let gpio = rppal::gpio::Gpio::new().map_err(|e| HwInitError::GpioUnavailable(e.to_string()))?;
    let mut claimed = Vec::with_capacity(4);
    for &pin in &config.pins {
        let output = gpio
            .get(pin)
            .map_err(|e| HwInitError::PinClaimFailed {
                pin,
                reason: e.to_string(),
            })?
            .into_output_low();
        claimed.push(RpiPin(output));
    }
    let pins: [BeltPin; 4] = claimed
        .try_into()
        .map_err(|_| HwInitError::GpioUnavailable("expected four belt pins".into()))?;
    info!("hw_init: belt phases on GPIO {:?}", config.pins);
    Ok(pins)
}

#[cfg(not(feature = "rpi"))]
pub fn init_belt_pins(config: &BeltConfig) -> Result<[BeltPin; 4], HwInitError> {
    info!("hw_init(sim): belt phases on simulated GPIO {:?}", config.pins);
    Ok(config.pins.map(SimPin::new))
}

#[cfg(feature = "rpi")]
pub fn init_servo(config: &ServoConfig) -> Result<ServoPwm, HwInitError> {
    let gpio = rppal::gpio::Gpio::new().map_err(|e| HwInitError::GpioUnavailable(e.to_string()))?;
    let pin = gpio
        .get(config.pin)
        .map_err(|e| HwInitError::PinClaimFailed {
            pin: config.pin,
            reason: e.to_string(),
        })?
        .into_output_low();
    info!("hw_init: servo on GPIO {} (software PWM)", config.pin);
    Ok(RpiServo {
        pin,
        period_us: config.period_us.min(u32::from(u16::MAX)) as u16,
    })
}

#[cfg(not(feature = "rpi"))]
pub fn init_servo(config: &ServoConfig) -> Result<ServoPwm, HwInitError> {
    info!("hw_init(sim): servo on simulated GPIO {}", config.pin);
    Ok(SimServo::new(
        config.pin,
        config.period_us.min(u32::from(u16::MAX)) as u16,
    ))
}
