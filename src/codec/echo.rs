//! Echo request/reply codecs. Bodies are opaque blobs echoed verbatim.

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    BufExt, CodecContext, MessageDecoder, MessageEncoder, TYPE_ECHO_REPLY, TYPE_ECHO_REQUEST,
};
use crate::error::{CodecError, RegistryError};
use crate::message::{EchoMessage, Message, MessageKind};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::ProtocolVersion;

/// Decoder for both echo directions; which one is fixed at registration.
pub struct EchoDecoder {
    reply: bool,
}

impl EchoDecoder {
    pub fn request() -> Self {
        Self { reply: false }
    }

    pub fn reply() -> Self {
        Self { reply: true }
    }
}

impl MessageDecoder for EchoDecoder {
    fn decode(&self, _ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let echo = EchoMessage {
            data: body.take_rest(),
        };
        Ok(if self.reply {
            Message::EchoReply(echo)
        } else {
            Message::EchoRequest(echo)
        })
    }
}

pub(super) struct EchoEncoder;

impl MessageEncoder for EchoEncoder {
    fn encode(
        &self,
        _ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let (Message::EchoRequest(echo) | Message::EchoReply(echo)) = message else {
            return Err(CodecError::Malformed("encoder expects an echo".into()));
        };
        dst.put_slice(&echo.data);
        Ok(())
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_ECHO_REQUEST),
            Box::new(EchoDecoder::request()),
        )?;
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_ECHO_REPLY),
            Box::new(EchoDecoder::reply()),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::EchoRequest),
            Box::new(EchoEncoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::EchoReply),
            Box::new(EchoEncoder),
        )?;
    }
    Ok(())
}
