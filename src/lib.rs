//! Item sorter library.
//!
//! Captures a frame of the item on the belt, asks a remote classifier for
//! its class while the belt advances, then rotates the bucket to that
//! class's position. Exposed as a library for the binaries and the
//! integration tests; hardware is reached through `embedded-hal` traits so
//! every module runs on a host without a Raspberry Pi.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod capture;
pub mod classes;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod rpc;

/// Crate version, as shown in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
