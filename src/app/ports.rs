//! Port traits: the boundary between the sort loop and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SortController (domain)
//! ```
//!
//! The belt and bucket are reached through `embedded-hal` traits and the
//! classifier through [`Transport`](crate::rpc::transport::Transport);
//! the ports here cover what those do not.

use crate::capture::CapturedFrame;

use super::events::SortEvent;

// ───────────────────────────────────────────────────────────────
// Capture port (driven adapter: camera → domain)
// ───────────────────────────────────────────────────────────────

/// Produces one frame per call. Failure is an absent frame, never a
/// panic or error; the controller decides what absence means.
#[allow(async_fn_in_trait)]
pub trait CapturePort {
    async fn capture(&mut self) -> Option<CapturedFrame>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`SortEvent`]s through this port.
/// Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &SortEvent);
}

/// Sink that drops everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &SortEvent) {}
}
