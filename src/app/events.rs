//! Outbound sort-loop events.
//!
//! The [`SortController`](super::service::SortController) emits these
//! through the [`EventSink`](super::ports::EventSink) port.

use crate::classes::ClassLabel;
use crate::drivers::servo::BucketMove;
use crate::error::Error;
use crate::fsm::SortState;

/// Structured events emitted by the sort loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SortEvent {
    /// The controller has started (carries the initial state).
    Started(SortState),

    /// The FSM moved between states.
    StateChanged { from: SortState, to: SortState },

    /// A frame is on disk and ready for classification.
    Captured { reference: String },

    /// The belt finished its advancement.
    BeltAdvanced { steps: u32 },

    /// The classifier answered.
    Classified {
        label: ClassLabel,
        name: Option<String>,
    },

    /// The bucket reached its position and settled.
    BucketRotated(BucketMove),

    /// The cycle finished; `cycle` counts from 1.
    CycleCompleted { cycle: u64 },

    /// The cycle stopped early.
    CycleAborted { reason: Error },
}
