//! Typed message model for the control channel.
//!
//! One variant per logical message kind; the wire layout per protocol
//! version lives in the codec catalog, not here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::oxm::Match;
use crate::types::{ExperimenterId, VersionSet};

/// Logical message kind, the dispatch component of a serializer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Hello,
    Error,
    EchoRequest,
    EchoReply,
    Experimenter,
    FeaturesRequest,
    FeaturesReply,
    PacketIn,
    PacketOut,
    FlowMod,
    PortStatus,
    BarrierRequest,
    BarrierReply,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// High-level message container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(HelloMessage),
    Error(ErrorMessage),
    EchoRequest(EchoMessage),
    EchoReply(EchoMessage),
    Experimenter(ExperimenterMessage),
    FeaturesRequest,
    FeaturesReply(FeaturesReply),
    PacketIn(PacketIn),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    PortStatus(PortStatus),
    BarrierRequest,
    BarrierReply,
}

impl Message {
    /// Get the logical message kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Hello(_) => MessageKind::Hello,
            Self::Error(_) => MessageKind::Error,
            Self::EchoRequest(_) => MessageKind::EchoRequest,
            Self::EchoReply(_) => MessageKind::EchoReply,
            Self::Experimenter(_) => MessageKind::Experimenter,
            Self::FeaturesRequest => MessageKind::FeaturesRequest,
            Self::FeaturesReply(_) => MessageKind::FeaturesReply,
            Self::PacketIn(_) => MessageKind::PacketIn,
            Self::PacketOut(_) => MessageKind::PacketOut,
            Self::FlowMod(_) => MessageKind::FlowMod,
            Self::PortStatus(_) => MessageKind::PortStatus,
            Self::BarrierRequest => MessageKind::BarrierRequest,
            Self::BarrierReply => MessageKind::BarrierReply,
        }
    }

    /// The experimenter id component used for serializer dispatch.
    pub fn experimenter_id(&self) -> Option<ExperimenterId> {
        match self {
            Self::Experimenter(m) => Some(m.experimenter),
            _ => None,
        }
    }
}

/// Hello message carrying negotiation elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelloMessage {
    /// Elements present in the body; empty for the legacy form.
    pub elements: Vec<HelloElement>,
}

impl HelloMessage {
    /// Legacy hello: no elements, version advertised by the header alone.
    pub fn legacy() -> Self {
        Self::default()
    }

    pub fn with_bitmap(versions: VersionSet) -> Self {
        Self {
            elements: vec![HelloElement::VersionBitmap(versions)],
        }
    }

    /// The version bitmap, if one was advertised.
    pub fn version_bitmap(&self) -> Option<VersionSet> {
        self.elements.iter().find_map(|e| match e {
            HelloElement::VersionBitmap(set) => Some(*set),
        })
    }
}

/// A single hello element. Unknown element types are skipped at decode
/// time and never materialize here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloElement {
    /// OFPHET_VERSIONBITMAP
    VersionBitmap(VersionSet),
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Error type (high-level category).
    pub err_type: u16,
    /// Error code within the type.
    pub code: u16,
    /// Offending message bytes or ASCII detail.
    pub data: Vec<u8>,
}

impl ErrorMessage {
    /// OFPET_HELLO_FAILED
    pub const TYPE_HELLO_FAILED: u16 = 0;
    /// OFPHFC_INCOMPATIBLE
    pub const CODE_INCOMPATIBLE: u16 = 0;

    /// The error sent to a peer with no common protocol version.
    pub fn hello_incompatible() -> Self {
        Self {
            err_type: Self::TYPE_HELLO_FAILED,
            code: Self::CODE_INCOMPATIBLE,
            data: Vec::new(),
        }
    }
}

/// Echo request/reply payload, echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EchoMessage {
    pub data: Vec<u8>,
}

impl EchoMessage {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Vendor extension message.
///
/// `exp_type` exists on the wire from 1.1 onward; the 1.0 VENDOR layout
/// carries only the vendor id, so 1.0 round-trips require `exp_type == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimenterMessage {
    pub experimenter: ExperimenterId,
    pub exp_type: u32,
    pub payload: Vec<u8>,
}

/// Switch features reply.
///
/// `auxiliary_id` exists from 1.3 onward; `actions` and `ports` only on 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeaturesReply {
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub auxiliary_id: Option<u8>,
    pub capabilities: u32,
    /// 1.0 supported-actions bitmap.
    pub actions: Option<u32>,
    /// 1.3+ reserved word.
    pub reserved: u32,
    /// 1.0 physical port descriptions.
    pub ports: Vec<PortDesc>,
}

/// Reason a packet was punted to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketInReason {
    /// No matching flow.
    NoMatch = 0,
    /// Explicit output-to-controller action.
    Action = 1,
    /// TTL expired (1.3+).
    InvalidTtl = 2,
}

impl PacketInReason {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NoMatch),
            1 => Some(Self::Action),
            2 => Some(Self::InvalidTtl),
            _ => None,
        }
    }
}

/// Packet-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: PacketInReason,
    /// 1.3+ table the lookup stopped in.
    pub table_id: Option<u8>,
    /// 1.3+ flow cookie.
    pub cookie: Option<u64>,
    /// 1.0 ingress port; 1.3+ carries it inside `r#match`.
    pub in_port: Option<u16>,
    /// 1.3+ match fields describing packet metadata.
    pub r#match: Option<Match>,
    pub payload: Vec<u8>,
}

/// Packet-out message. Actions travel as an opaque length-delimited blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Flow-mod command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

impl FlowModCommand {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Add),
            1 => Some(Self::Modify),
            2 => Some(Self::ModifyStrict),
            3 => Some(Self::Delete),
            4 => Some(Self::DeleteStrict),
            _ => None,
        }
    }
}

/// Flow table modification (OXM form, 1.3+).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub r#match: Match,
    /// Instruction list as an opaque blob; round-trips bit-exactly.
    pub instructions: Vec<u8>,
}

/// Port status change reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortStatusReason {
    Add = 0,
    Delete = 1,
    Modify = 2,
}

impl PortStatusReason {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Add),
            1 => Some(Self::Delete),
            2 => Some(Self::Modify),
            _ => None,
        }
    }
}

/// Port status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortStatusReason,
    pub desc: PortDesc,
}

/// Port description.
///
/// 1.0 ports are 16-bit on the wire (widened here) and have no speed
/// fields; 1.3+ ports are 32-bit with current/max speeds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: [u8; 6],
    /// Interface name, at most 15 bytes on the wire.
    pub name: String,
    pub config: u32,
    pub state: u32,
    pub curr: u32,
    pub advertised: u32,
    pub supported: u32,
    pub peer: u32,
    /// 1.3+ current speed in kbps.
    pub curr_speed: Option<u32>,
    /// 1.3+ maximum speed in kbps.
    pub max_speed: Option<u32>,
}
