//! Experimenter (vendor extension) message codec.
//!
//! These codecs are not registered by default: a vendor registers an
//! instance under its own 32-bit id, making the experimenter id a
//! first-class dispatch component with no fallback path.
//!
//! The raw codec here carries the extension payload opaquely; vendors with
//! structured payloads implement their own `MessageDecoder`/`MessageEncoder`
//! and register them the same way.

use bytes::{BufMut, Bytes, BytesMut};

use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder};
use crate::error::CodecError;
use crate::message::{ExperimenterMessage, Message};
use crate::types::{ExperimenterId, ProtocolVersion};

/// Decoder for one vendor's experimenter messages.
pub struct ExperimenterDecoder {
    expected: ExperimenterId,
}

impl ExperimenterDecoder {
    pub fn new(expected: ExperimenterId) -> Self {
        Self { expected }
    }
}

impl MessageDecoder for ExperimenterDecoder {
    fn decode(&self, ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let experimenter = ExperimenterId(body.try_u32()?);
        if experimenter != self.expected {
            return Err(CodecError::Malformed(format!(
                "experimenter id {experimenter} does not match registration {}",
                self.expected
            )));
        }

        // 1.0 VENDOR has no subtype word
        let exp_type = if ctx.version == ProtocolVersion::V1_0 {
            0
        } else {
            body.try_u32()?
        };

        Ok(Message::Experimenter(ExperimenterMessage {
            experimenter,
            exp_type,
            payload: body.take_rest(),
        }))
    }
}

/// Encoder for one vendor's experimenter messages.
pub struct ExperimenterEncoder;

impl MessageEncoder for ExperimenterEncoder {
    fn encode(
        &self,
        ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::Experimenter(msg) = message else {
            return Err(CodecError::Malformed(
                "encoder expects an Experimenter".into(),
            ));
        };
        dst.put_u32(msg.experimenter.0);
        if ctx.version == ProtocolVersion::V1_0 {
            // The VENDOR layout cannot express a subtype
            if msg.exp_type != 0 {
                return Err(CodecError::UnsupportedForVersion {
                    kind: message.kind(),
                    version: ctx.version,
                });
            }
        } else {
            dst.put_u32(msg.exp_type);
        }
        dst.put_slice(&msg.payload);
        Ok(())
    }
}
