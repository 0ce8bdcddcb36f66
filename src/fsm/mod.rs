//! Sort-cycle state machine.
//!
//! ```text
//!        ┌──────┐  capture   ┌───────────┐  frame   ┌────────────────┐
//!   ┌──▶ │ Idle │ ─────────▶ │ Capturing │ ───────▶ │ AwaitingResult │
//!   │    └──────┘            └───────────┘          └────────────────┘
//!   │        ▲                      │ abort                 │ label
//!   │        └──────────────────────┘                       ▼
//!   │                                               ┌──────────┐
//!   └────────────────────── settled ─────────────── │ Rotating │
//!                                                   └──────────┘
//! ```
//!
//! The cycle has no terminal state. Any state may abort straight back to
//! `Idle`; every other move is to the fixed successor. The controller
//! drives the machine; this module only tracks where it is and logs each
//! move.

use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// States of one sort cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortState {
    Idle,
    Capturing,
    AwaitingResult,
    Rotating,
}

impl SortState {
    /// Total number of states.
    pub const COUNT: usize = 4;

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Capturing => "Capturing",
            Self::AwaitingResult => "AwaitingResult",
            Self::Rotating => "Rotating",
        }
    }

    /// Next state on success.
    pub const fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Capturing,
            Self::Capturing => Self::AwaitingResult,
            Self::AwaitingResult => Self::Rotating,
            Self::Rotating => Self::Idle,
        }
    }

    /// Whether `self -> to` is a move the cycle allows.
    pub const fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Idle, Self::Capturing)
            | (Self::Capturing, Self::AwaitingResult)
            | (Self::AwaitingResult, Self::Rotating) => true,
            (Self::Idle, Self::Idle) => false,
            (_, Self::Idle) => true,
            _ => false,
        }
    }
}

impl core::fmt::Display for SortState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A completed move, `from -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SortState,
    pub to: SortState,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Tracks the current state and counts completed cycles.
#[derive(Debug)]
pub struct SortFsm {
    current: SortState,
    transitions: u64,
    completed: u64,
    aborted: u64,
}

impl SortFsm {
    /// A machine sitting in `Idle`.
    pub fn new() -> Self {
        Self {
            current: SortState::Idle,
            transitions: 0,
            completed: 0,
            aborted: 0,
        }
    }

    pub fn start(&self) {
        info!("FSM starting in state: {}", self.current);
    }

    /// Move to the successor of the current state.
    pub fn advance(&mut self) -> Transition {
        let next = self.current.successor();
        if next == SortState::Idle {
            self.completed += 1;
        }
        self.transition(next)
    }

    /// Drop back to `Idle` without completing the cycle. Returns `None`
    /// if already idle.
    pub fn abort(&mut self) -> Option<Transition> {
        if self.current == SortState::Idle {
            return None;
        }
        self.aborted += 1;
        Some(self.transition(SortState::Idle))
    }

    pub fn current_state(&self) -> SortState {
        self.current
    }

    /// Cycles that reached `Idle` through `Rotating`.
    pub fn completed_cycles(&self) -> u64 {
        self.completed
    }

    pub fn aborted_cycles(&self) -> u64 {
        self.aborted
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    fn transition(&mut self, next: SortState) -> Transition {
        debug_assert!(self.current.can_transition_to(next));
        info!("FSM transition: {} -> {}", self.current, next);
        let from = self.current;
        self.current = next;
        self.transitions += 1;
        Transition { from, to: next }
    }
}

impl Default for SortFsm {
    fn default() -> Self {
        Self::new()
    }
}
