//! Frame splitter for the control channel byte stream.
//!
//! Splits the inbound stream into header + body frames without decoding
//! bodies; a short read means "wait for more bytes", never "malformed".
//! Outbound frames are pre-encoded and passed through verbatim.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{OfpHeader, TYPE_EXPERIMENTER};
use crate::error::ConnectionError;
use crate::types::{ExperimenterId, Xid};
use crate::{HEADER_LEN, MAX_MESSAGE_LEN};

/// One framed message, body not yet decoded.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub version: u8,
    pub msg_type: u8,
    pub xid: Xid,
    /// Vendor id peeked from the body of experimenter messages; the body
    /// still contains it, the experimenter codec consumes it.
    pub experimenter: Option<ExperimenterId>,
    pub body: Bytes,
}

/// Tokio codec for message framing.
pub struct OfpFrameCodec {
    max_frame_len: usize,
}

impl OfpFrameCodec {
    /// Create a new codec with the default frame bound.
    pub fn new() -> Self {
        Self {
            max_frame_len: MAX_MESSAGE_LEN,
        }
    }

    /// Create a codec with a custom frame bound.
    pub fn with_max_frame(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for OfpFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for OfpFrameCodec {
    type Item = RawFrame;
    type Error = crate::Error;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        // Need the full header to learn the frame size
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        // Peek total length from the header
        let total_len = u16::from_be_bytes([src[2], src[3]]) as usize;

        // A length below the header size can never frame correctly again;
        // this is connection-fatal, not a per-message decode failure.
        if total_len < HEADER_LEN {
            return Err(ConnectionError::FrameTooShort { length: total_len }.into());
        }
        if total_len > self.max_frame_len {
            return Err(ConnectionError::FrameTooLarge {
                length: total_len,
                max: self.max_frame_len,
            }
            .into());
        }

        // Wait for the complete frame
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total_len).freeze();
        let header = OfpHeader::decode(&mut frame).expect("header length checked above");
        let body = frame;

        let experimenter = if header.msg_type == TYPE_EXPERIMENTER && body.remaining() >= 4 {
            let id = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            Some(ExperimenterId(id))
        } else {
            None
        };

        Ok(Some(RawFrame {
            version: header.version,
            msg_type: header.msg_type,
            xid: header.xid,
            experimenter,
            body,
        }))
    }
}

impl Encoder<Bytes> for OfpFrameCodec {
    type Error = crate::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        if item.len() > self.max_frame_len {
            return Err(ConnectionError::FrameTooLarge {
                length: item.len(),
                max: self.max_frame_len,
            }
            .into());
        }
        dst.reserve(item.len());
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn frame_bytes(version: u8, msg_type: u8, xid: u32, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(version);
        buf.put_u8(msg_type);
        buf.put_u16((HEADER_LEN + body.len()) as u16);
        buf.put_u32(xid);
        buf.put_slice(body);
        buf
    }

    #[test]
    fn partial_header_waits() {
        let mut codec = OfpFrameCodec::new();
        let mut buf = BytesMut::from(&[0x04u8, 0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_body_waits() {
        let mut codec = OfpFrameCodec::new();
        let mut buf = frame_bytes(0x04, 2, 7, b"ping");
        buf.truncate(10);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn complete_frame_splits_exactly() {
        let mut codec = OfpFrameCodec::new();
        let mut buf = frame_bytes(0x04, 2, 7, b"ping");
        // Trailing bytes of the next frame must be left in place
        buf.put_u8(0x04);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.version, 0x04);
        assert_eq!(frame.msg_type, 2);
        assert_eq!(frame.xid, Xid(7));
        assert_eq!(&frame.body[..], b"ping");
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn undersized_length_is_fatal() {
        let mut codec = OfpFrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u8(0x04);
        buf.put_u8(0x00);
        buf.put_u16(4); // below header size
        buf.put_u32(0);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn oversized_length_is_fatal() {
        let mut codec = OfpFrameCodec::with_max_frame(64);
        let mut buf = frame_bytes(0x04, 2, 1, &[0u8; 100]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn experimenter_id_is_peeked_not_consumed() {
        let mut codec = OfpFrameCodec::new();
        let mut body = vec![];
        body.extend_from_slice(&0x0000_2320u32.to_be_bytes());
        body.extend_from_slice(&[0, 0, 0, 9]);
        let mut buf = frame_bytes(0x04, TYPE_EXPERIMENTER, 3, &body);

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.experimenter, Some(ExperimenterId(0x2320)));
        // Body still begins with the vendor id for the codec to consume
        assert_eq!(frame.body.len(), 8);
        assert_eq!(&frame.body[..4], &0x0000_2320u32.to_be_bytes());
    }
}
