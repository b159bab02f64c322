//! Barrier request/reply codecs.
//!
//! Bodies are empty; the interesting part is the version-dependent wire
//! type code handled by the dispatch table.

use bytes::{Bytes, BytesMut};

use super::{wire_type_for, CodecContext, MessageDecoder, MessageEncoder};
use crate::error::{CodecError, RegistryError};
use crate::message::{Message, MessageKind};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

pub(super) struct BarrierDecoder {
    reply: bool,
}

impl MessageDecoder for BarrierDecoder {
    fn decode(&self, _ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        if !body.is_empty() {
            return Err(CodecError::Malformed(format!(
                "barrier body carries {} unexpected bytes",
                body.len()
            )));
        }
        Ok(if self.reply {
            Message::BarrierReply
        } else {
            Message::BarrierRequest
        })
    }
}

pub(super) struct BarrierEncoder;

impl MessageEncoder for BarrierEncoder {
    fn encode(
        &self,
        _ctx: &CodecContext<'_>,
        message: &Message,
        _dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        match message {
            Message::BarrierRequest | Message::BarrierReply => Ok(()),
            _ => Err(CodecError::Malformed("encoder expects a barrier".into())),
        }
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        let request_code = wire_type_for(version, MessageKind::BarrierRequest)
            .expect("barrier exists on every version");
        let reply_code = wire_type_for(version, MessageKind::BarrierReply)
            .expect("barrier exists on every version");

        registry.register_deserializer(
            DeserializerKey::new(version, request_code),
            Box::new(BarrierDecoder { reply: false }),
        )?;
        registry.register_deserializer(
            DeserializerKey::new(version, reply_code),
            Box::new(BarrierDecoder { reply: true }),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::BarrierRequest),
            Box::new(BarrierEncoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::BarrierReply),
            Box::new(BarrierEncoder),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_body, encode_message};
    use crate::types::Xid;
    use crate::HEADER_LEN;

    #[test]
    fn barrier_type_code_tracks_version() {
        let registry = CodecRegistry::with_defaults().unwrap();

        let v0 = encode_message(&registry, ProtocolVersion::V1_0, Xid(1), &Message::BarrierRequest)
            .unwrap();
        assert_eq!(v0[1], 18);

        let v3 = encode_message(&registry, ProtocolVersion::V1_3, Xid(1), &Message::BarrierRequest)
            .unwrap();
        assert_eq!(v3[1], 20);
    }

    #[test]
    fn barrier_reply_round_trip() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let frame =
            encode_message(&registry, ProtocolVersion::V1_3, Xid(5), &Message::BarrierReply)
                .unwrap();
        assert_eq!(frame.len(), HEADER_LEN);

        let decoded =
            decode_body(&registry, ProtocolVersion::V1_3, 21, None, frame.slice(HEADER_LEN..))
                .unwrap();
        assert_eq!(decoded, Message::BarrierReply);
    }

    #[test]
    fn nonempty_barrier_body_is_malformed() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let err = decode_body(
            &registry,
            ProtocolVersion::V1_0,
            18,
            None,
            Bytes::from_static(&[0]),
        )
        .unwrap_err();
        assert!(err.is_recoverable());
    }
}
