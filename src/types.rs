//! Core types used throughout ofchannel.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OpenFlow protocol version with its canonical wire identifier.
///
/// The ordering of variants is the ordering of wire identifiers; version
/// negotiation picks the highest mutually supported value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    /// OpenFlow 1.0
    V1_0 = 0x01,
    /// OpenFlow 1.1
    V1_1 = 0x02,
    /// OpenFlow 1.2
    V1_2 = 0x03,
    /// OpenFlow 1.3
    V1_3 = 0x04,
    /// OpenFlow 1.4
    V1_4 = 0x05,
    /// OpenFlow 1.5
    V1_5 = 0x06,
}

impl ProtocolVersion {
    /// All versions this build knows the wire layout of.
    pub const ALL: [Self; 6] = [
        Self::V1_0,
        Self::V1_1,
        Self::V1_2,
        Self::V1_3,
        Self::V1_4,
        Self::V1_5,
    ];

    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::V1_0),
            0x02 => Some(Self::V1_1),
            0x03 => Some(Self::V1_2),
            0x04 => Some(Self::V1_3),
            0x05 => Some(Self::V1_4),
            0x06 => Some(Self::V1_5),
            _ => None,
        }
    }

    /// The wire-level numeric identifier.
    pub fn wire_id(self) -> u8 {
        self as u8
    }

    /// Whether Hello version-bitmap elements exist for this version.
    ///
    /// 1.0 and 1.1 peers only advertise the raw header version.
    pub fn supports_version_bitmap(self) -> bool {
        self >= Self::V1_2
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1_0 => write!(f, "1.0"),
            Self::V1_1 => write!(f, "1.1"),
            Self::V1_2 => write!(f, "1.2"),
            Self::V1_3 => write!(f, "1.3"),
            Self::V1_4 => write!(f, "1.4"),
            Self::V1_5 => write!(f, "1.5"),
        }
    }
}

/// Set of protocol versions, convertible to and from the Hello
/// VERSIONBITMAP wire form (bit N set = wire id N supported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionSet(u32);

impl VersionSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_versions(versions: &[ProtocolVersion]) -> Self {
        let mut set = Self::empty();
        for v in versions {
            set.insert(*v);
        }
        set
    }

    /// Reconstruct from bitmap words as carried in a Hello element.
    ///
    /// Word 0 covers wire ids 0..32; later words cover higher ids, which no
    /// current version uses but remain legal on the wire.
    pub fn from_bitmap_words(words: &[u32]) -> Self {
        Self(words.first().copied().unwrap_or(0))
    }

    pub fn insert(&mut self, version: ProtocolVersion) {
        self.0 |= 1 << version.wire_id();
    }

    pub fn contains(self, version: ProtocolVersion) -> bool {
        self.0 & (1 << version.wire_id()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bitmap words for the Hello VERSIONBITMAP element.
    pub fn bitmap_words(self) -> Vec<u32> {
        vec![self.0]
    }

    /// Highest version present in both sets.
    pub fn highest_common(self, other: Self) -> Option<ProtocolVersion> {
        let common = self.0 & other.0;
        ProtocolVersion::ALL
            .iter()
            .rev()
            .copied()
            .find(|v| common & (1 << v.wire_id()) != 0)
    }

    /// Highest version in this set.
    pub fn highest(self) -> Option<ProtocolVersion> {
        ProtocolVersion::ALL
            .iter()
            .rev()
            .copied()
            .find(|v| self.contains(*v))
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        write!(f, "{{")?;
        for v in ProtocolVersion::ALL {
            if self.contains(v) {
                if !first {
                    write!(f, ",")?;
                }
                write!(f, "{v}")?;
                first = false;
            }
        }
        write!(f, "}}")
    }
}

/// Transaction id correlating requests and replies on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Xid(pub u32);

impl Xid {
    pub const ZERO: Self = Self(0);

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// 32-bit vendor identifier for experimenter messages and match fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimenterId(pub u32);

impl fmt::Display for ExperimenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Unique identifier for a switch connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Reason reported with the single disconnect notification per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The peer closed the stream.
    PeerClosed,
    /// Version negotiation failed or timed out.
    HandshakeFailed,
    /// Keepalive probes went unanswered.
    Timeout,
    /// Framing became unrecoverable.
    ProtocolFatal,
    /// Local teardown was requested.
    Requested,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::HandshakeFailed => write!(f, "handshake failed"),
            Self::Timeout => write!(f, "keepalive timeout"),
            Self::ProtocolFatal => write!(f, "protocol fatal"),
            Self::Requested => write!(f, "requested"),
        }
    }
}
