//! Hello message codec.
//!
//! The body is a list of TLV elements; the only element this build
//! materializes is VERSIONBITMAP. Unknown element types are skipped by
//! length, and an empty body is the legacy hello.

use bytes::{BufMut, Bytes, BytesMut};

use super::{BufExt, CodecContext, MessageDecoder, MessageEncoder, TYPE_HELLO};
use crate::error::{CodecError, RegistryError};
use crate::message::{HelloElement, HelloMessage, Message, MessageKind};
use crate::registry::{CodecRegistry, DeserializerKey, SerializerKey};
use crate::types::{ProtocolVersion, VersionSet};

/// OFPHET_VERSIONBITMAP
const ELEM_VERSION_BITMAP: u16 = 1;

/// Parse hello elements from a body.
///
/// Shared with the handshake machine, which must parse Hello from peers
/// whose version is not otherwise registered.
pub fn decode_hello_elements(body: &mut Bytes) -> Result<Vec<HelloElement>, CodecError> {
    let mut elements = Vec::new();
    while !body.is_empty() {
        let elem_type = body.try_u16()?;
        let elem_len = body.try_u16()? as usize;
        if elem_len < 4 {
            return Err(CodecError::Malformed(format!(
                "hello element length {elem_len} below element header size"
            )));
        }
        let payload_len = elem_len - 4;

        if elem_type == ELEM_VERSION_BITMAP {
            if payload_len % 4 != 0 {
                return Err(CodecError::Malformed(format!(
                    "version bitmap payload of {payload_len} bytes is not word-aligned"
                )));
            }
            let mut words = Vec::with_capacity(payload_len / 4);
            for _ in 0..payload_len / 4 {
                words.push(body.try_u32()?);
            }
            elements.push(HelloElement::VersionBitmap(VersionSet::from_bitmap_words(
                &words,
            )));
        } else {
            body.try_skip(payload_len)?;
        }

        // Elements are zero padded to the 8-byte boundary
        let pad = (8 - elem_len % 8) % 8;
        body.try_skip(pad.min(body.len()))?;
    }
    Ok(elements)
}

/// Encode hello elements into a body buffer.
pub fn encode_hello_body(elements: &[HelloElement], dst: &mut BytesMut) {
    for element in elements {
        match element {
            HelloElement::VersionBitmap(set) => {
                let words = set.bitmap_words();
                let elem_len = 4 + 4 * words.len();
                dst.put_u16(ELEM_VERSION_BITMAP);
                dst.put_u16(elem_len as u16);
                for word in words {
                    dst.put_u32(word);
                }
                let pad = (8 - elem_len % 8) % 8;
                dst.put_bytes(0, pad);
            }
        }
    }
}

pub(super) struct HelloDecoder;

impl MessageDecoder for HelloDecoder {
    fn decode(&self, _ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Message, CodecError> {
        let elements = decode_hello_elements(body)?;
        Ok(Message::Hello(HelloMessage { elements }))
    }
}

pub(super) struct HelloEncoder;

impl MessageEncoder for HelloEncoder {
    fn encode(
        &self,
        _ctx: &CodecContext<'_>,
        message: &Message,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let Message::Hello(hello) = message else {
            return Err(CodecError::Malformed("encoder expects a Hello".into()));
        };
        encode_hello_body(&hello.elements, dst);
        Ok(())
    }
}

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_3] {
        registry.register_deserializer(
            DeserializerKey::new(version, TYPE_HELLO),
            Box::new(HelloDecoder),
        )?;
        registry.register_serializer(
            SerializerKey::new(version, MessageKind::Hello),
            Box::new(HelloEncoder),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_hello_is_empty() {
        let mut body = Bytes::new();
        assert!(decode_hello_elements(&mut body).unwrap().is_empty());
    }

    #[test]
    fn bitmap_element_round_trip() {
        let set = VersionSet::from_versions(&[ProtocolVersion::V1_0, ProtocolVersion::V1_3]);
        let mut buf = BytesMut::new();
        encode_hello_body(&[HelloElement::VersionBitmap(set)], &mut buf);
        assert_eq!(buf.len(), 8);

        let elements = decode_hello_elements(&mut buf.freeze()).unwrap();
        assert_eq!(elements, vec![HelloElement::VersionBitmap(set)]);
    }

    #[test]
    fn unknown_elements_are_skipped_by_length() {
        let mut buf = BytesMut::new();
        // Unknown element type 0x7f, 6 payload bytes, padded to 16
        buf.put_u16(0x7f);
        buf.put_u16(10);
        buf.put_slice(&[0xaa; 6]);
        buf.put_slice(&[0; 6]);
        let set = VersionSet::from_versions(&[ProtocolVersion::V1_3]);
        encode_hello_body(&[HelloElement::VersionBitmap(set)], &mut buf);

        let elements = decode_hello_elements(&mut buf.freeze()).unwrap();
        assert_eq!(elements, vec![HelloElement::VersionBitmap(set)]);
    }

    #[test]
    fn element_length_below_header_is_malformed() {
        let mut buf = BytesMut::new();
        buf.put_u16(ELEM_VERSION_BITMAP);
        buf.put_u16(2);
        let err = decode_hello_elements(&mut buf.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
