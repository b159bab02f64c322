//! Error types for ofchannel.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::message::MessageKind;
use crate::types::{DisconnectReason, ProtocolVersion};

/// Result type alias for ofchannel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ofchannel.
#[derive(Error, Debug)]
pub enum Error {
    // Registry errors
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    // Codec errors
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    // Connection errors
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Codec registry errors.
///
/// Duplicate registration is startup-fatal; a lookup miss is recoverable and
/// the caller decides between drop-and-log and a protocol Error reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate registration for {0}")]
    DuplicateRegistration(String),

    #[error("no codec registered for {0}")]
    NotFound(String),
}

/// Message and match-entry encode/decode errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("truncated message: need {needed} more bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("decoder left {left} undecoded bytes inside the declared body")]
    TrailingBytes { left: usize },

    #[error("unknown protocol version: {0:#04x}")]
    UnknownVersion(u8),

    #[error("unknown message type {code} for version {version}")]
    UnknownMessageType { version: ProtocolVersion, code: u8 },

    #[error("unknown match field: class {class:#06x}, field {field}")]
    UnknownMatchField { class: u16, field: u8 },

    #[error(
        "match entry length mismatch for class {class:#06x} field {field}: \
         payload {got} bytes, field width {width} (masked: {masked_width})"
    )]
    MatchEntryLengthMismatch {
        class: u16,
        field: u8,
        got: usize,
        width: usize,
        masked_width: usize,
    },

    #[error("{kind:?} has no wire representation for version {version}")]
    UnsupportedForVersion {
        kind: MessageKind,
        version: ProtocolVersion,
    },
}

/// Per-connection lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[from] HandshakeError),

    #[error("keepalive timeout: {misses} consecutive echo probes unanswered")]
    KeepaliveTimeout { misses: u32 },

    #[error("frame length {length} below header size")]
    FrameTooShort { length: usize },

    #[error("frame length {length} exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("connection closed")]
    Closed,

    #[error("message submitted before version negotiation completed")]
    NotNegotiated,
}

/// Version negotiation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("no common protocol version (local {local}, peer {peer})")]
    NoCommonVersion { local: String, peer: String },

    #[error("peer version {0:#04x} is not supported locally")]
    UnsupportedPeerVersion(u8),

    #[error("peer did not send Hello within the handshake timeout")]
    Timeout,
}

/// Transport layer errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed on {addr}: {reason}")]
    BindFailed { addr: SocketAddr, reason: String },

    #[error("accept failed: {0}")]
    AcceptFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("connection rejected by accept policy: {0}")]
    Rejected(SocketAddr),
}

impl Error {
    /// Check if the error is local to a single message and leaves the
    /// connection usable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Codec(c) => !matches!(c, CodecError::UnknownVersion(_)),
            Error::Registry(RegistryError::NotFound(_)) => true,
            _ => false,
        }
    }

    /// Check if the error must tear the connection down.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::Connection(
                ConnectionError::HandshakeFailed(_)
                    | ConnectionError::KeepaliveTimeout { .. }
                    | ConnectionError::FrameTooShort { .. }
                    | ConnectionError::FrameTooLarge { .. }
            ) | Error::Io(_)
        )
    }

    /// Map a fatal error to the disconnect reason reported to the listener.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        match self {
            Error::Connection(ConnectionError::HandshakeFailed(_)) => {
                DisconnectReason::HandshakeFailed
            }
            Error::Connection(ConnectionError::KeepaliveTimeout { .. }) => {
                DisconnectReason::Timeout
            }
            Error::Connection(
                ConnectionError::FrameTooShort { .. } | ConnectionError::FrameTooLarge { .. },
            ) => DisconnectReason::ProtocolFatal,
            Error::Io(_) => DisconnectReason::PeerClosed,
            _ => DisconnectReason::ProtocolFatal,
        }
    }
}
