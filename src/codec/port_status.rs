//! Port status codec and the shared port-description layouts.
//!
//! 1.0 uses the 48-byte phy-port layout with a 16-bit port number; 1.3
//! widens the port number to 32 bits and appends speed fields (64 bytes).

use bytes::{BufMut, Bytes, BytesMut};

use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder};
use crate::error::{CodecError, RegistryError};
use crate::message::{Message, MessageKind, PortDesc, PortStatus, PortStatusReason};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

const TYPE_PORT_STATUS: u8 = 12;
const PORT_NAME_LEN: usize = 16;

pub(super) fn decode_port_desc(
    version: ProtocolVersion,
    body: &mut Bytes,
) -> Result<PortDesc, CodecError> {
    let mut desc = PortDesc::default();

    if version == ProtocolVersion::V1_0 {
        desc.port_no = u32::from(body.try_u16()?);
    } else {
        desc.port_no = body.try_u32()?;
        body.try_skip(4)?;
    }

    desc.hw_addr = body.try_array::<6>()?;
    if version != ProtocolVersion::V1_0 {
        body.try_skip(2)?;
    }

    let name_bytes = body.try_array::<PORT_NAME_LEN>()?;
    let end = name_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(PORT_NAME_LEN);
    desc.name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();

    desc.config = body.try_u32()?;
    desc.state = body.try_u32()?;
    desc.curr = body.try_u32()?;
    desc.advertised = body.try_u32()?;
    desc.supported = body.try_u32()?;
    desc.peer = body.try_u32()?;

    if version != ProtocolVersion::V1_0 {
        desc.curr_speed = Some(body.try_u32()?);
        desc.max_speed = Some(body.try_u32()?);
    }

    Ok(desc)
}

pub(super) fn encode_port_desc(
    version: ProtocolVersion,
    desc: &PortDesc,
    dst: &mut BytesMut,
) -> Result<(), CodecError> {
    if version == ProtocolVersion::V1_0 {
        if desc.port_no > u32::from(u16::MAX) {
            return Err(CodecError::Malformed(format!(
                "port number {} does not fit the 1.0 16-bit field",
                desc.port_no
            )));
        }
        dst.put_u16(desc.port_no as u16);
    } else {
        dst.put_u32(desc.port_no);
        dst.put_bytes(0, 4);
    }

    dst.put_slice(&desc.hw_addr);
    if version != ProtocolVersion::V1_0 {
        dst.put_bytes(0, 2);
    }

    if desc.name.len() >= PORT_NAME_LEN {
        return Err(CodecError::Malformed(format!(
            "port name '{}' exceeds {} bytes",
            desc.name,
            PORT_NAME_LEN - 1
        )));
    }
    dst.put_slice(desc.name.as_bytes());
    dst.put_bytes(0, PORT_NAME_LEN - desc.name.len());

    dst.put_u32(desc.config);
    dst.put_u32(desc.state);
    dst.put_u32(desc.curr);
    dst.put_u32(desc.advertised);
    dst.put_u32(desc.supported);
    dst.put_u32(desc.peer);

    if version != ProtocolVersion::V1_0 {
        dst.put_u32(desc.curr_speed.unwrap_or(0));
        dst.put_u32(desc.max_speed.unwrap_or(0));
    }

    Ok(())
}

pub(super) struct PortStatusDecoder;

impl MessageDecoder for PortStatusDecoder {
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let raw_reason = body.try_u8()?;
        let reason = PortStatusReason::from_u8(raw_reason).ok_or_else(|| {
            CodecError::Malformed(format!("unknown port status reason {raw_reason}"))
        })?;
        body.try_skip(7)?;
        let desc = decode_port_desc(ctx.version, body)?;
        Ok(Message::PortStatus(PortStatus { reason, desc }))
    }
}

pub(super) struct PortStatusEncoder;

impl MessageEncoder for PortStatusEncoder {
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::PortStatus(status) = message else {
            return Err(CodecError::Malformed("encoder expects a PortStatus".into()));
        };
        dst.put_u8(status.reason as u8);
        dst.put_bytes(0, 7);
        encode_port_desc(ctx.version, &status.desc, dst)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_PORT_STATUS),
            Box::new(PortStatusDecoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::PortStatus),
            Box::new(PortStatusEncoder),
        )?;
    }
    Ok(())
}
