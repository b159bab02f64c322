//! Flow-mod codec (OXM form, 1.3+).
//!
//! The 1.0 fixed-match layout has no representation in the OXM match model,
//! so the 1.0 encoder fails explicitly instead of guessing.

use bytes::{BufMut, Bytes, BytesMut};

use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder};
use crate::error::{CodecError, RegistryError};
use crate::message::{FlowMod, FlowModCommand, Message, MessageKind};
use crate::oxm::Match;
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

const TYPE_FLOW_MOD: u8 = 14;

pub(super) struct FlowModDecoder;

impl MessageDecoder for FlowModDecoder {
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let cookie = body.try_u64()?;
        let cookie_mask = body.try_u64()?;
        let table_id = body.try_u8()?;
        let raw_command = body.try_u8()?;
        let command = FlowModCommand::from_u8(raw_command).ok_or_else(|| {
            CodecError::Malformed(format!("unknown flow-mod command {raw_command}"))
        })?;
        let idle_timeout = body.try_u16()?;
        let hard_timeout = body.try_u16()?;
        let priority = body.try_u16()?;
        let buffer_id = body.try_u32()?;
        let out_port = body.try_u32()?;
        let out_group = body.try_u32()?;
        let flags = body.try_u16()?;
        body.try_skip(2)?;
        let r#match = Match::decode(ctx, body)?;
        let instructions = body.take_rest();

        Ok(Message::FlowMod(FlowMod {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id,
            out_port,
            out_group,
            flags,
            r#match,
            instructions,
        }))
    }
}

pub(super) struct FlowModEncoder;

impl MessageEncoder for FlowModEncoder {
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::FlowMod(fm) = message else {
            return Err(CodecError::Malformed("encoder expects a FlowMod".into()));
        };
        if ctx.version < ProtocolVersion::V1_2 {
            return Err(CodecError::UnsupportedForVersion {
                kind: MessageKind::FlowMod,
                version: ctx.version,
            });
        }

        dst.put_u64(fm.cookie);
        dst.put_u64(fm.cookie_mask);
        dst.put_u8(fm.table_id);
        dst.put_u8(fm.command as u8);
        dst.put_u16(fm.idle_timeout);
        dst.put_u16(fm.hard_timeout);
        dst.put_u16(fm.priority);
        dst.put_u32(fm.buffer_id);
        dst.put_u32(fm.out_port);
        dst.put_u32(fm.out_group);
        dst.put_u16(fm.flags);
        dst.put_bytes(0, 2);
        fm.r#match.encode(ctx, dst)?;
        dst.put_slice(&fm.instructions);
        Ok(())
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    // Inbound flow-mods only make sense on 1.3; the 1.0 wire layout is a
    // registry miss, surfaced as NotFound rather than misparsed.
    registry.register_deserializer(
        DeserializerKey::new(ProtocolVersion::V1_3, TYPE_FLOW_MOD),
        Box::new(FlowModDecoder),
    )?;
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::FlowMod),
            Box::new(FlowModEncoder),
        )?;
    }
    Ok(())
}
