//! Error message codec: type, code, then offending-message bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder, TYPE_ERROR};
use crate::error::{CodecError, RegistryError};
use crate::message::{ErrorMessage, Message, MessageKind};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

pub(super) struct ErrorDecoder;

impl MessageDecoder for ErrorDecoder {
    fn decode(&self, _ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        Ok(Message::Error(ErrorMessage {
            err_type: body.try_u16()?,
            code: body.try_u16()?,
            data: body.take_rest(),
        }))
    }
}

pub(super) struct ErrorEncoder;

impl MessageEncoder for ErrorEncoder {
    fn encode(
        &self,
        _ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::Error(err) = message else {
            return Err(CodecError::Malformed("encoder expects an Error".into()));
        };
        dst.put_u16(err.err_type);
        dst.put_u16(err.code);
        dst.put_slice(&err.data);
        Ok(())
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_ERROR),
            Box::new(ErrorDecoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::Error),
            Box::new(ErrorEncoder),
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
    fn error_round_trip() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let msg = Message::Error(ErrorMessage {
            err_type: 1,
            code: 5,
            data: vec![0x04, 0x0e],
        });

        let frame = encode_message(&registry, ProtocolVersion::V1_3, Xid(2), &msg).unwrap();
        let decoded = decode_body(
            &registry,
            ProtocolVersion::V1_3,
            TYPE_ERROR,
            None,
            frame.slice(HEADER_LEN..),
        )
        .unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn truncated_error_body_fails() {
        let registry = CodecRegistry::with_defaults().unwrap();
        let err = decode_body(
            &registry,
            ProtocolVersion::V1_0,
            TYPE_ERROR,
            None,
            Bytes::from_static(&[0x00]),
        )
        .unwrap_err();
        assert!(err.is_recoverable());
    }
}
