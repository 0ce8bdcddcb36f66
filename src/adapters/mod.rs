//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements | Connects to                    |
//! |------------|------------|--------------------------------|
//! | `logger`   | `log::Log` | stderr + classifier log mirror |
//! | `log_sink` | EventSink  | `log` facade                   |
//!
//! The camera adapter lives in [`crate::capture`] and the hardware
//! backends in [`crate::drivers::hw_init`].

pub mod log_sink;
pub mod logger;
