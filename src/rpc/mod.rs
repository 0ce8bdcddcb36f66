//! Classifier link.
//!
//! Length-prefixed JSON events over a byte transport, with one
//! classification request in flight at a time.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Classifier link                         │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│  Codec   │──▶│  ClassificationChannel │  │
//! │  │ (trait)   │   │ (framing)│   │  request / wait        │  │
//! │  └───────────┘   └──────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       └──────────── wire (JSON events) ◀───┘               │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod codec;
pub mod transport;
pub mod wire;
