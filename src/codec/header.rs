//! The fixed wire header shared by every protocol version.
//!
//! ```text
//! ┌─────────────┬──────────┬──────────────┬────────────────────┐
//! │ Version (1) │ Type (1) │ Length (2)   │ Transaction id (4) │
//! └─────────────┴──────────┴──────────────┴────────────────────┘
//! ```
//!
//! Length is big-endian and includes the header itself.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::BufExt;
use crate::error::CodecError;
use crate::types::{ProtocolVersion, Xid};
use crate::{HEADER_LEN, MAX_MESSAGE_LEN};

/// Parsed wire header.
///
/// `version` stays raw here: pre-negotiation frames may legitimately carry
/// versions this build does not fully support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: Xid,
}

impl OfpHeader {
    /// Build a header for an encoded body.
    pub fn for_body(
        version: ProtocolVersion,
        msg_type: u8,
        body_len: usize,
        xid: Xid,
    ) -> Result<Self, CodecError> {
        let total = HEADER_LEN + body_len;
        if total > MAX_MESSAGE_LEN {
            return Err(CodecError::Malformed(format!(
                "encoded message of {total} bytes exceeds the 16-bit length field"
            )));
        }
        Ok(Self {
            version: version.wire_id(),
            msg_type,
            length: total as u16,
            xid,
        })
    }

    /// Byte count of the body this header announces.
    pub fn body_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_LEN)
    }

    /// Append the header to a buffer.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.version);
        dst.put_u8(self.msg_type);
        dst.put_u16(self.length);
        dst.put_u32(self.xid.0);
    }

    /// Parse a header from the front of a buffer.
    pub fn decode(src: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            version: src.try_u8()?,
            msg_type: src.try_u8()?,
            length: src.try_u16()?,
            xid: Xid(src.try_u32()?),
        })
    }
}
