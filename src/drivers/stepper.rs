//! Belt stepper driver (unipolar 4-phase, one-phase-on drive).
//!
//! A ring counter holds a single active bit that rotates through the four
//! phase outputs. Each step energises exactly one phase for
//! `phase_hold`, then shifts the bit. After a full advancement every
//! phase is driven low so the coils do not sit on holding current.
//!
//! ```text
//!  TowardLower:   0b1000 ─▶ 0b0100 ─▶ 0b0010 ─▶ 0b0001 ─┐
//!                   ▲                                   │
//!                   └───────────────────────────────────┘
//! ```
//!
//! The driver is generic over [`embedded_hal::digital::OutputPin`] so the
//! same sequencing runs against Raspberry Pi GPIO, simulated pins, or
//! recording pins in tests.

use core::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::config::{BeltConfig, RingDirection};
use crate::error::ActuatorError;

// ---------------------------------------------------------------------------
// Ring counter
// ---------------------------------------------------------------------------

/// One of the four stepper phases. Internally the one-hot ring mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeltPhase(u8);

impl BeltPhase {
    pub const COUNT: usize = 4;

    const FIRST_MASK: u8 = 0b0001;
    const LAST_MASK: u8 = 0b1000;

    /// Phase from its index (0..=3).
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self(1 << index))
        } else {
            None
        }
    }

    /// Index of the energised phase output (0..=3).
    pub const fn index(self) -> usize {
        self.0.trailing_zeros() as usize
    }

    /// One-hot mask: bit `i` set means phase output `i` is high.
    pub const fn mask(self) -> u8 {
        self.0
    }

    /// Shift the ring one position in `direction`.
    pub const fn next(self, direction: RingDirection) -> Self {
        let mask = match direction {
            RingDirection::TowardLower => {
                if self.0 == Self::FIRST_MASK {
                    Self::LAST_MASK
                } else {
                    self.0 >> 1
                }
            }
            RingDirection::TowardHigher => {
                if self.0 == Self::LAST_MASK {
                    Self::FIRST_MASK
                } else {
                    self.0 << 1
                }
            }
        };
        Self(mask)
    }
}

impl Default for BeltPhase {
    fn default() -> Self {
        Self(Self::FIRST_MASK)
    }
}

/// Free-function form of [`BeltPhase::next`].
pub const fn next_phase(phase: BeltPhase, direction: RingDirection) -> BeltPhase {
    phase.next(direction)
}

// ---------------------------------------------------------------------------
// Belt actuator
// ---------------------------------------------------------------------------

/// Drives the conveyor one increment per [`advance`](Self::advance).
pub struct BeltActuator<P> {
    pins: [P; BeltPhase::COUNT],
    /// Last phase energised. Persisted across advancements so the ring
    /// continues where the previous increment stopped.
    phase: BeltPhase,
    steps_per_advance: u32,
    phase_hold: Duration,
    direction: RingDirection,
    advances: u64,
}

impl<P: OutputPin> BeltActuator<P> {
    pub fn new(pins: [P; BeltPhase::COUNT], config: &BeltConfig) -> Self {
        Self {
            pins,
            phase: BeltPhase::default(),
            steps_per_advance: config.steps_per_advance,
            phase_hold: Duration::from_millis(config.phase_hold_ms),
            direction: config.direction,
            advances: 0,
        }
    }

    /// Run one full advancement: `steps_per_advance` phase-steps, each held
    /// for `phase_hold`, then release all phases.
    ///
    /// Yields to the executor during every hold. Returns the number of
    /// phase-steps driven.
    pub async fn advance(&mut self) -> Result<u32, ActuatorError> {
        debug!(
            "Belt: advancing {} steps ({:?}, hold {:?})",
            self.steps_per_advance, self.direction, self.phase_hold
        );

        for _ in 0..self.steps_per_advance {
            let next = self.phase.next(self.direction);
            if let Err(e) = self.write_mask(next.mask()) {
                self.release_after_fault();
                return Err(e);
            }
            self.phase = next;
            async_io_mini::Timer::after(self.phase_hold).await;
        }

        self.release()?;
        self.advances += 1;
        Ok(self.steps_per_advance)
    }

    /// Drive every phase low.
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.write_mask(0)
    }

    /// Phase most recently energised.
    pub fn phase(&self) -> BeltPhase {
        self.phase
    }

    pub fn direction(&self) -> RingDirection {
        self.direction
    }

    /// Change the ring direction for subsequent advancements.
    pub fn set_direction(&mut self, direction: RingDirection) {
        self.direction = direction;
    }

    pub fn steps_per_advance(&self) -> u32 {
        self.steps_per_advance
    }

    /// Number of completed advancements since construction.
    pub fn advance_count(&self) -> u64 {
        self.advances
    }

    pub fn pins(&self) -> &[P; BeltPhase::COUNT] {
        &self.pins
    }

    fn write_mask(&mut self, mask: u8) -> Result<(), ActuatorError> {
        for (pin_index, pin) in self.pins.iter_mut().enumerate() {
            let result = if mask & (1 << pin_index) != 0 {
                pin.set_high()
            } else {
                pin.set_low()
            };
            result.map_err(|_| ActuatorError::GpioWriteFailed { pin_index })?;
        }
        Ok(())
    }

    fn release_after_fault(&mut self) {
        if let Err(e) = self.release() {
            warn!("Belt: release after fault also failed: {}", e);
        }
    }
}
