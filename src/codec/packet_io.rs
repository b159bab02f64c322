//! Packet-in / packet-out codecs.
//!
//! Packet-in is where the per-version divergence is widest: 1.0 names the
//! ingress port directly, 1.3 wraps packet metadata in an OXM match.

use bytes::{BufMut, Bytes, BytesMut};

use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder};
use crate::error::{CodecError, RegistryError};
use crate::message::{Message, MessageKind, PacketIn, PacketInReason, PacketOut};
use crate::oxm::Match;
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

const TYPE_PACKET_IN: u8 = 10;
const TYPE_PACKET_OUT: u8 = 13;

pub(super) struct PacketInDecoder;

impl MessageDecoder for PacketInDecoder {
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let buffer_id = body.try_u32()?;
        let total_len = body.try_u16()?;

        if ctx.version == ProtocolVersion::V1_0 {
            let in_port = body.try_u16()?;
            let raw_reason = body.try_u8()?;
            let reason = PacketInReason::from_u8(raw_reason).ok_or_else(|| {
                CodecError::Malformed(format!("unknown packet-in reason {raw_reason}"))
            })?;
            body.try_skip(1)?;
            return Ok(Message::PacketIn(PacketIn {
                buffer_id,
                total_len,
                reason,
                table_id: None,
                cookie: None,
                in_port: Some(in_port),
                r#match: None,
                payload: body.take_rest(),
            }));
        }

        let raw_reason = body.try_u8()?;
        let reason = PacketInReason::from_u8(raw_reason).ok_or_else(|| {
            CodecError::Malformed(format!("unknown packet-in reason {raw_reason}"))
        })?;
        let table_id = body.try_u8()?;
        let cookie = body.try_u64()?;
        let r#match = Match::decode(ctx, body)?;
        body.try_skip(2)?;

        Ok(Message::PacketIn(PacketIn {
            buffer_id,
            total_len,
            reason,
            table_id: Some(table_id),
            cookie: Some(cookie),
            in_port: None,
            r#match: Some(r#match),
            payload: body.take_rest(),
        }))
    }
}

pub(super) struct PacketInEncoder;

impl MessageEncoder for PacketInEncoder {
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::PacketIn(pi) = message else {
            return Err(CodecError::Malformed("encoder expects a PacketIn".into()));
        };

        dst.put_u32(pi.buffer_id);
        dst.put_u16(pi.total_len);

        if ctx.version == ProtocolVersion::V1_0 {
            let in_port = pi.in_port.ok_or(CodecError::UnsupportedForVersion {
                kind: MessageKind::PacketIn,
                version: ctx.version,
            })?;
            dst.put_u16(in_port);
            dst.put_u8(pi.reason as u8);
            dst.put_u8(0);
        } else {
            let r#match = pi.r#match.as_ref().ok_or(CodecError::UnsupportedForVersion {
                kind: MessageKind::PacketIn,
                version: ctx.version,
            })?;
            dst.put_u8(pi.reason as u8);
            dst.put_u8(pi.table_id.unwrap_or(0));
            dst.put_u64(pi.cookie.unwrap_or(0));
            r#match.encode(ctx, dst)?;
            dst.put_bytes(0, 2);
        }

        dst.put_slice(&pi.payload);
        Ok(())
    }
}

pub(super) struct PacketOutDecoder;

impl MessageDecoder for PacketOutDecoder {
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let buffer_id = body.try_u32()?;

        let (in_port, actions_len) = if ctx.version == ProtocolVersion::V1_0 {
            let port = u32::from(body.try_u16()?);
            let len = body.try_u16()? as usize;
            (port, len)
        } else {
            let port = body.try_u32()?;
            let len = body.try_u16()? as usize;
            body.try_skip(6)?;
            (port, len)
        };

        let actions = body.try_vec(actions_len)?;
        Ok(Message::PacketOut(PacketOut {
            buffer_id,
            in_port,
            actions,
            payload: body.take_rest(),
        }))
    }
}

pub(super) struct PacketOutEncoder;

impl MessageEncoder for PacketOutEncoder {
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::PacketOut(po) = message else {
            return Err(CodecError::Malformed("encoder expects a PacketOut".into()));
        };
        if po.actions.len() > usize::from(u16::MAX) {
            return Err(CodecError::Malformed(format!(
                "action blob of {} bytes exceeds the 16-bit length field",
                po.actions.len()
            )));
        }

        dst.put_u32(po.buffer_id);
        if ctx.version == ProtocolVersion::V1_0 {
            if po.in_port > u32::from(u16::MAX) {
                return Err(CodecError::Malformed(format!(
                    "port number {} does not fit the 1.0 16-bit field",
                    po.in_port
                )));
            }
            dst.put_u16(po.in_port as u16);
            dst.put_u16(po.actions.len() as u16);
        } else {
            dst.put_u32(po.in_port);
            dst.put_u16(po.actions.len() as u16);
            dst.put_bytes(0, 6);
        }
        dst.put_slice(&po.actions);
        dst.put_slice(&po.payload);
        Ok(())
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_PACKET_IN),
            Box::new(PacketInDecoder),
        )?;
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_PACKET_OUT),
            Box::new(PacketOutDecoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::PacketIn),
            Box::new(PacketInEncoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::PacketOut),
            Box::new(PacketOutEncoder),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_body, encode_message};
    use crate::oxm::MatchField;
    use crate::types::Xid;
    use crate::HEADER_LEN;

    #[test]
    fn v1_0_packet_in_round_trip() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let msg = Message::PacketIn(PacketIn {
            buffer_id: 0xffff_ffff,
            total_len: 60,
            reason: PacketInReason::NoMatch,
            table_id: None,
            cookie: None,
            in_port: Some(7),
            r#match: None,
            payload: vec![0xde, 0xad, 0xbe, 0xef],
        });

        let frame = encode_message(&registry, ProtocolVersion::V1_0, Xid(3), &msg).unwrap();
        let decoded = decode_body(
            &registry,
            ProtocolVersion::V1_0,
            TYPE_PACKET_IN,
            None,
            frame.slice(HEADER_LEN..),
        )
        .unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn v1_3_packet_in_round_trip_with_match() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let msg = Message::PacketIn(PacketIn {
            buffer_id: 0x100,
            total_len: 128,
            reason: PacketInReason::Action,
            table_id: Some(4),
            cookie: Some(0xfeed),
            in_port: None,
            r#match: Some(Match::from_fields(vec![MatchField::InPort(7)])),
            payload: vec![1, 2, 3],
        });

        let frame = encode_message(&registry, ProtocolVersion::V1_3, Xid(3), &msg).unwrap();
        let decoded = decode_body(
            &registry,
            ProtocolVersion::V1_3,
            TYPE_PACKET_IN,
            None,
            frame.slice(HEADER_LEN..),
        )
        .unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn v1_3_packet_in_without_match_is_unsupported() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let msg = Message::PacketIn(PacketIn {
            buffer_id: 0,
            total_len: 0,
            reason: PacketInReason::NoMatch,
            table_id: None,
            cookie: None,
            in_port: Some(1),
            r#match: None,
            payload: vec![],
        });
        let err = encode_message(&registry, ProtocolVersion::V1_3, Xid(1), &msg).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Codec(CodecError::UnsupportedForVersion { .. })
        ));
    }

    #[test]
    fn packet_out_round_trip_both_versions() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let msg = Message::PacketOut(PacketOut {
            buffer_id: 0xffff_ffff,
            in_port: 0xfff8, // OFPP_CONTROLLER on 1.0
            actions: vec![0x00, 0x00, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00],
            payload: vec![0xca, 0xfe],
        });

        for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
            let frame = encode_message(&registry, version, Xid(6), &msg).unwrap();
            let decoded = decode_body(
                &registry,
                version,
                TYPE_PACKET_OUT,
                None,
                frame.slice(HEADER_LEN..),
            )
            .unwrap();
            assert_eq!(decoded, msg);
        }
    }
}
