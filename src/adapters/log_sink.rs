//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured sort events through the
//! `log` facade, which puts them on the console and, when bound, on the
//! remote mirror.

use log::{info, warn};

use crate::app::events::SortEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`SortEvent`] as one line.
pub struct LogEventSink {
    emitted: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { emitted: 0 }
    }

    /// Events logged so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SortEvent) {
        self.emitted += 1;
        match event {
            SortEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
            SortEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            SortEvent::Captured { reference } => {
                info!("CAPTURE | ref={}", reference);
            }
            SortEvent::BeltAdvanced { steps } => {
                info!("BELT | steps={}", steps);
            }
            SortEvent::Classified { label, name } => {
                info!(
                    "CLASSIFY | label={} ({})",
                    label,
                    name.as_deref().unwrap_or("unknown")
                );
            }
            SortEvent::BucketRotated(mv) => {
                info!(
                    "SORT | label={} angle={} pulse={}us",
                    mv.label, mv.angle_deg, mv.pulse.0
                );
            }
            SortEvent::CycleCompleted { cycle } => {
                info!("CYCLE | #{} done", cycle);
            }
            SortEvent::CycleAborted { reason } => {
                warn!("CYCLE | aborted: {}", reason);
            }
        }
    }
}
