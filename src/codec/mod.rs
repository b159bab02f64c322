//! Message codec layer.
//!
//! Defines the encode/decode contract every per-message codec implements,
//! the fixed wire header, the frame splitter, and the built-in catalog of
//! message codecs for OpenFlow 1.0 and 1.3.
//!
//! Each codec implements exactly one direction. Decoders receive the body
//! with the header already consumed and must consume it exactly; encoders
//! produce the body for a target version or fail with
//! `UnsupportedForVersion` when that version has no layout for the message.

mod barrier;
mod echo;
mod error_msg;
mod experimenter;
mod features;
mod flow_mod;
mod framing;
mod header;
mod hello;
mod packet_io;
mod port_status;

pub use echo::EchoDecoder;
pub use experimenter::{ExperimenterDecoder, ExperimenterEncoder};
pub use framing::{OfpFrameCodec, RawFrame};
pub use header::OfpHeader;
pub use hello::{decode_hello_elements, encode_hello_body};

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{CodecError, Error};
use crate::message::{Message, MessageKind};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::{ProtocolVersion, Xid};
use crate::HEADER_LEN;

/// Wire type code for HELLO (all versions).
pub const TYPE_HELLO: u8 = 0;
/// Wire type code for ERROR (all versions).
pub const TYPE_ERROR: u8 = 1;
/// Wire type code for ECHO_REQUEST (all versions).
pub const TYPE_ECHO_REQUEST: u8 = 2;
/// Wire type code for ECHO_REPLY (all versions).
pub const TYPE_ECHO_REPLY: u8 = 3;
/// Wire type code for EXPERIMENTER (VENDOR on 1.0).
pub const TYPE_EXPERIMENTER: u8 = 4;

/// Shared state handed to every codec invocation.
///
/// Carries the target version and the registry so match-structure codecs
/// can recursively dispatch per-field work.
pub struct CodecContext<'a> {
    pub version: ProtocolVersion,
    pub registry: &'a CodecRegistry,
}

/// Decode direction of the message codec contract.
pub trait MessageDecoder: Send + Sync {
    /// Decode a message body. The caller verifies the body was consumed
    /// exactly; leftover bytes are a contract violation.
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError>;
}

/// Encode direction of the message codec contract.
pub trait MessageEncoder: Send + Sync {
    /// Encode the message body (header excluded) for `ctx.version`.
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError>;
}

/// Wire type code for a logical message kind under a protocol version.
///
/// Returns `None` when the version has no such message. The barrier pair is
/// the notable divergence: 18/19 on 1.0, 20/21 from 1.1 onward.
pub fn wire_type_for(version: ProtocolVersion, kind: MessageKind) -> Option<u8> {
    let code = match kind {
        MessageKind::Hello => TYPE_HELLO,
        MessageKind::Error => TYPE_ERROR,
        MessageKind::EchoRequest => TYPE_ECHO_REQUEST,
        MessageKind::EchoReply => TYPE_ECHO_REPLY,
        MessageKind::Experimenter => TYPE_EXPERIMENTER,
        MessageKind::FeaturesRequest => 5,
        MessageKind::FeaturesReply => 6,
        MessageKind::PacketIn => 10,
        MessageKind::PortStatus => 12,
        MessageKind::PacketOut => 13,
        MessageKind::FlowMod => 14,
        MessageKind::BarrierRequest => {
            if version == ProtocolVersion::V1_0 {
                18
            } else {
                20
            }
        }
        MessageKind::BarrierReply => {
            if version == ProtocolVersion::V1_0 {
                19
            } else {
                21
            }
        }
    };
    Some(code)
}

/// Encode a full framed message: registry dispatch, body encode, header.
pub fn encode_message(
    registry: &CodecRegistry,
    version: ProtocolVersion,
    xid: Xid,
    message: &Message,
) -> Result<Bytes, Error> {
    let kind = message.kind();
    let code = wire_type_for(version, kind).ok_or(CodecError::UnsupportedForVersion {
        kind,
        version,
    })?;

    let key = match message.experimenter_id() {
        Some(id) => SerializerKey::experimenter(version, kind, id),
        None => SerializerKey::new(version, kind),
    };
    let encoder = registry.serializer(&key)?;

    let ctx = CodecContext { version, registry };
    let mut body = BytesMut::new();
    encoder.encode(&ctx, message, &mut body)?;

    let header = OfpHeader::for_body(version, code, body.len(), xid)?;
    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    header.encode(&mut frame);
    frame.extend_from_slice(&body);
    Ok(frame.freeze())
}

/// Decode the body of a framed message via registry dispatch.
///
/// `experimenter` is the id peeked from the body by the framing step when
/// the type code indicates a vendor extension message.
pub fn decode_body(
    registry: &CodecRegistry,
    version: ProtocolVersion,
    msg_type: u8,
    experimenter: Option<crate::types::ExperimenterId>,
    body: Bytes,
) -> Result<Message, Error> {
    let key = match experimenter {
        Some(id) => DeserializerKey::experimenter(version, msg_type, id),
        None => DeserializerKey::new(version, msg_type),
    };
    let decoder = registry.deserializer(&key)?;

    let ctx = CodecContext { version, registry };
    let mut body = body;
    let message = decoder.decode(&ctx, &mut body)?;
    if body.has_remaining() {
        return Err(CodecError::TrailingBytes {
            left: body.remaining(),
        }
        .into());
    }
    Ok(message)
}

/// Register the built-in message catalog for OpenFlow 1.0 and 1.3.
pub fn register_defaults(registry: &mut CodecRegistry) -> Result<(), crate::error::RegistryError> {
    hello::register(registry)?;
    error_msg::register(registry)?;
    echo::register(registry)?;
    features::register(registry)?;
    packet_io::register(registry)?;
    flow_mod::register(registry)?;
    port_status::register(registry)?;
    barrier::register(registry)?;
    Ok(())
}

/// Checked big-endian reads over any [`Buf`].
///
/// `bytes` panics on short reads; wire decoding must fail instead.
pub trait BufExt: Buf {
    fn need(&self, n: usize) -> Result<(), CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n - self.remaining(),
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn try_u8(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        Ok(self.get_u8())
    }

    fn try_u16(&mut self) -> Result<u16, CodecError> {
        self.need(2)?;
        Ok(self.get_u16())
    }

    fn try_u32(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        Ok(self.get_u32())
    }

    fn try_u64(&mut self) -> Result<u64, CodecError> {
        self.need(8)?;
        Ok(self.get_u64())
    }

    fn try_vec(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        self.need(n)?;
        let mut out = vec![0u8; n];
        self.copy_to_slice(&mut out);
        Ok(out)
    }

    fn try_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.copy_to_slice(&mut out);
        Ok(out)
    }

    fn try_skip(&mut self, n: usize) -> Result<(), CodecError> {
        self.need(n)?;
        self.advance(n);
        Ok(())
    }

    /// Remaining bytes as an owned vector (echo data, payloads).
    fn take_rest(&mut self) -> Vec<u8> {
        let mut out = vec![0u8; self.remaining()];
        self.copy_to_slice(&mut out);
        out
    }
}

impl<B: Buf + ?Sized> BufExt for B {}
