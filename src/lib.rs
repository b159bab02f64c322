//! # ofchannel
//!
//! OpenFlow switch-control-channel core.
//!
//! Implements the binary, versioned, TLV-rich message layer exchanged between
//! a network switch and a controller over a persistent connection: a
//! version-keyed codec registry, the OXM match-entry codec, and a
//! per-connection adapter with handshake and keepalive state machines.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Listener (controller app)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │           Controller (accept policy, connection table)          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │       Connection Adapter (framing, ordering, backpressure)      │
//! │        ┌───────────────┐   ┌────────────────────┐               │
//! │        │   Handshake   │   │ Keepalive Monitor  │               │
//! │        └───────────────┘   └────────────────────┘               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │       Codec Registry (version × type × experimenter)            │
//! │        ┌──────────────────┐   ┌───────────────────────┐         │
//! │        │  Message codecs  │   │ OXM match-entry TLVs  │         │
//! │        └──────────────────┘   └───────────────────────┘         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │             Transport (TCP, TLS wrapped externally)             │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]      // Many functions can't be const due to trait bounds
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::cast_possible_truncation)]  // Wire lengths are range-checked before casts
#![allow(clippy::match_same_arms)]           // Explicit arm per variant is clearer
#![allow(clippy::use_self)]                  // Explicit type names in matches
#![allow(clippy::cognitive_complexity)]      // Complex state machines
#![allow(clippy::too_many_lines)]            // Complete implementations
#![allow(clippy::future_not_send)]           // Async internals
#![allow(clippy::option_if_let_else)]        // More readable in context
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use
#![allow(clippy::ignored_unit_patterns)]     // Ok(_) vs Ok(()) is stylistic

pub mod codec;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod message;
pub mod oxm;
pub mod registry;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// IANA-assigned port for the OpenFlow control channel.
pub const DEFAULT_PORT: u16 = 6653;

/// Fixed wire header size shared by every protocol version.
pub const HEADER_LEN: usize = 8;

/// Upper bound on a framed message; the header length field is 16 bits.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::connection::{ConnectionEvent, ConnectionHandle};
    pub use crate::controller::{AcceptPolicy, Controller};
    pub use crate::error::{Error, Result};
    pub use crate::message::{Message, MessageKind};
    pub use crate::oxm::{Match, MatchField};
    pub use crate::registry::CodecRegistry;
    pub use crate::types::{ProtocolVersion, VersionSet, Xid};
}
