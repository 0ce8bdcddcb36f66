//! Application core: the sort loop.
//!
//! The business rules for the sorter live here: one cycle of capture,
//! classification, belt advance and bucket rotation, driven by the
//! [`fsm`](crate::fsm). All interaction with hardware happens through
//! **port traits** defined in [`ports`] and the `embedded-hal` traits, so
//! this layer is fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
