//! Features request/reply codecs.
//!
//! The reply is the canonical example of version-dependent field layout:
//! 1.0 carries a supported-actions bitmap plus per-port descriptions, 1.3
//! replaces them with an auxiliary connection id and a reserved word.

use bytes::{BufMut, Bytes, BytesMut};

use super::port_status::{decode_port_desc, encode_port_desc};
use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder};
use crate::error::{CodecError, RegistryError};
use crate::message::{FeaturesReply, Message, MessageKind};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

const TYPE_FEATURES_REQUEST: u8 = 5;
const TYPE_FEATURES_REPLY: u8 = 6;

pub(super) struct FeaturesRequestDecoder;

impl MessageDecoder for FeaturesRequestDecoder {
    fn decode(&self, _ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        if !body.is_empty() {
            return Err(CodecError::Malformed(format!(
                "features request carries {} unexpected bytes",
                body.len()
            )));
        }
        Ok(Message::FeaturesRequest)
    }
}

pub(super) struct FeaturesRequestEncoder;

impl MessageEncoder for FeaturesRequestEncoder {
    fn encode(
        &self,
        _ctx: &CodecContext<'_>,
        message: &Message,
        _dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        match message {
            Message::FeaturesRequest => Ok(()),
            _ => Err(CodecError::Malformed(
                "encoder expects a FeaturesRequest".into(),
            )),
        }
    }
}

pub(super) struct FeaturesReplyDecoder;

impl MessageDecoder for FeaturesReplyDecoder {
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let datapath_id = body.try_u64()?;
        let n_buffers = body.try_u32()?;
        let n_tables = body.try_u8()?;

        let mut reply = FeaturesReply {
            datapath_id,
            n_buffers,
            n_tables,
            ..FeaturesReply::default()
        };

        if ctx.version == ProtocolVersion::V1_0 {
            body.try_skip(3)?;
            reply.capabilities = body.try_u32()?;
            reply.actions = Some(body.try_u32()?);
            while !body.is_empty() {
                reply.ports.push(decode_port_desc(ctx.version, body)?);
            }
        } else {
            reply.auxiliary_id = Some(body.try_u8()?);
            body.try_skip(2)?;
            reply.capabilities = body.try_u32()?;
            reply.reserved = body.try_u32()?;
        }

        Ok(Message::FeaturesReply(reply))
    }
}

pub(super) struct FeaturesReplyEncoder;

impl MessageEncoder for FeaturesReplyEncoder {
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::FeaturesReply(reply) = message else {
            return Err(CodecError::Malformed(
                "encoder expects a FeaturesReply".into(),
            ));
        };

        dst.put_u64(reply.datapath_id);
        dst.put_u32(reply.n_buffers);
        dst.put_u8(reply.n_tables);

        if ctx.version == ProtocolVersion::V1_0 {
            dst.put_bytes(0, 3);
            dst.put_u32(reply.capabilities);
            dst.put_u32(reply.actions.unwrap_or(0));
            for port in &reply.ports {
                encode_port_desc(ctx.version, port, dst)?;
            }
        } else {
            dst.put_u8(reply.auxiliary_id.unwrap_or(0));
            dst.put_bytes(0, 2);
            dst.put_u32(reply.capabilities);
            dst.put_u32(reply.reserved);
        }

        Ok(())
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_FEATURES_REQUEST),
            Box::new(FeaturesRequestDecoder),
        )?;
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_FEATURES_REPLY),
            Box::new(FeaturesReplyDecoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::FeaturesRequest),
            Box::new(FeaturesRequestEncoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::FeaturesReply),
            Box::new(FeaturesReplyEncoder),
        )?;
    }
    Ok(())
}
