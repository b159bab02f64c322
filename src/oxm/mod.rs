//! OXM match structure and TLV entry codec.
//!
//! ## Entry format
//!
//! ```text
//! ┌────────────┬────────────────┬────────────┬───────────────────────┐
//! │ Class (16) │ Field (7) + M (1) │ Length (8) │ Value [ ‖ Mask ] ... │
//! └────────────┴────────────────┴────────────┴───────────────────────┘
//! ```
//!
//! Length counts payload bytes only. A masked entry carries value then an
//! equal-width mask, so its payload is exactly twice the field width. The
//! enclosing match structure declares its own length and pads to the
//! 8-byte boundary; padding is skipped, never decoded.

mod fields;

pub use fields::{MacAddr, MatchField};

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{BufExt, CodecContext};
use crate::error::{CodecError, RegistryError};
use crate::registry::{CodecRegistry, MatchEntryKey};

/// OFPXMC_NXM_0
pub const OXM_CLASS_NXM_0: u16 = 0x0000;
/// OFPXMC_NXM_1
pub const OXM_CLASS_NXM_1: u16 = 0x0001;
/// OFPXMC_OPENFLOW_BASIC
pub const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000;
/// OFPXMC_EXPERIMENTER
pub const OXM_CLASS_EXPERIMENTER: u16 = 0xffff;

/// OFPMT_OXM: the only match type with a TLV body.
const MATCH_TYPE_OXM: u16 = 1;

/// One wire entry handed to a field codec, header already parsed and the
/// value/mask split already validated against the field width.
pub struct RawMatchEntry<'a> {
    pub class: u16,
    pub field: u8,
    pub has_mask: bool,
    pub value: &'a [u8],
    pub mask: Option<&'a [u8]>,
}

/// Codec for one typed, optionally masked match field.
pub trait MatchFieldCodec: Send + Sync {
    /// Nominal value width in bytes; `None` for variable-width entries
    /// (experimenter), which receive the raw payload unsplit.
    fn value_width(&self) -> Option<usize>;

    /// Whether the has-mask form is legal for this field.
    fn maskable(&self) -> bool;

    fn decode(&self, raw: &RawMatchEntry<'_>) -> Result<MatchField, CodecError>;

    /// Write value (and mask, if present). The caller writes the entry
    /// header with the resulting payload length.
    fn encode(&self, field: &MatchField, dst: &mut BytesMut) -> Result<(), CodecError>;
}

/// A flow match: an ordered list of typed match fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Match {
    pub entries: Vec<MatchField>,
}

impl Match {
    pub fn from_fields(entries: Vec<MatchField>) -> Self {
        Self { entries }
    }

    /// Decode a match structure, consuming its trailing padding.
    pub fn decode(ctx: &CodecContext<'_>, body: &mut Bytes) -> Result<Self, CodecError> {
        let match_type = body.try_u16()?;
        if match_type != MATCH_TYPE_OXM {
            return Err(CodecError::Malformed(format!(
                "unsupported match type {match_type}"
            )));
        }
        let match_len = body.try_u16()? as usize;
        if match_len < 4 {
            return Err(CodecError::Malformed(format!(
                "match length {match_len} below match header size"
            )));
        }

        let entries_len = match_len - 4;
        body.need(entries_len)?;
        let mut entries_buf = body.split_to(entries_len);

        let mut entries = Vec::new();
        while !entries_buf.is_empty() {
            entries.push(decode_entry(ctx, &mut entries_buf)?);
        }

        // Alignment padding up to the 8-byte boundary is not entry data
        body.try_skip(pad_to_8(match_len))?;
        Ok(Self { entries })
    }

    /// Encode the match structure including trailing padding.
    ///
    /// The written length is exactly what decode re-consumes; round-trip
    /// fidelity is a correctness property of this codec.
    pub fn encode(&self, ctx: &CodecContext<'_>, dst: &mut BytesMut) -> Result<(), CodecError> {
        let mut entries_buf = BytesMut::new();
        for entry in &self.entries {
            encode_entry(ctx, entry, &mut entries_buf)?;
        }

        let match_len = 4 + entries_buf.len();
        if match_len > usize::from(u16::MAX) {
            return Err(CodecError::Malformed(format!(
                "match of {match_len} bytes exceeds the 16-bit length field"
            )));
        }

        dst.put_u16(MATCH_TYPE_OXM);
        dst.put_u16(match_len as u16);
        dst.put_slice(&entries_buf);
        dst.put_bytes(0, pad_to_8(match_len));
        Ok(())
    }
}

fn decode_entry(ctx: &CodecContext<'_>, buf: &mut Bytes) -> Result<MatchField, CodecError> {
    let class = buf.try_u16()?;
    let field_byte = buf.try_u8()?;
    let field = field_byte >> 1;
    let has_mask = field_byte & 0x01 != 0;
    let payload_len = buf.try_u8()? as usize;

    let key = entry_key(ctx, class, field);
    let codec = ctx
        .registry
        .match_field(&key)
        .map_err(|_| CodecError::UnknownMatchField { class, field })?;

    let payload = buf.try_vec(payload_len)?;

    let (value, mask) = match codec.value_width() {
        Some(width) => {
            let expected = if has_mask { 2 * width } else { width };
            if payload_len != expected {
                return Err(CodecError::MatchEntryLengthMismatch {
                    class,
                    field,
                    got: payload_len,
                    width,
                    masked_width: 2 * width,
                });
            }
            if has_mask && !codec.maskable() {
                return Err(CodecError::Malformed(format!(
                    "match field class {class:#06x} field {field} does not permit a mask"
                )));
            }
            if has_mask {
                (&payload[..width], Some(&payload[width..]))
            } else {
                (&payload[..], None)
            }
        }
        None => (&payload[..], None),
    };

    codec.decode(&RawMatchEntry {
        class,
        field,
        has_mask,
        value,
        mask,
    })
}

fn encode_entry(
    ctx: &CodecContext<'_>,
    entry: &MatchField,
    dst: &mut BytesMut,
) -> Result<(), CodecError> {
    let class = entry.oxm_class();
    let field = entry.oxm_field();

    let key = entry_key(ctx, class, field);
    let codec = ctx
        .registry
        .match_field(&key)
        .map_err(|_| CodecError::UnknownMatchField { class, field })?;

    let mut payload = BytesMut::new();
    codec.encode(entry, &mut payload)?;
    if payload.len() > usize::from(u8::MAX) {
        return Err(CodecError::Malformed(format!(
            "match entry payload of {} bytes exceeds the 8-bit length field",
            payload.len()
        )));
    }

    dst.put_u16(class);
    dst.put_u8((field << 1) | u8::from(entry.has_mask()));
    dst.put_u8(payload.len() as u8);
    dst.put_slice(&payload);
    Ok(())
}

/// Dispatch key for an entry: experimenter entries register one codec per
/// class with the field component absent.
fn entry_key(ctx: &CodecContext<'_>, class: u16, field: u8) -> MatchEntryKey {
    if class == OXM_CLASS_EXPERIMENTER {
        MatchEntryKey::class_wildcard(ctx.version, class)
    } else {
        MatchEntryKey::new(ctx.version, class, field)
    }
}

/// Zero padding needed to reach the next 8-byte boundary.
pub(crate) fn pad_to_8(len: usize) -> usize {
    (8 - len % 8) % 8
}

/// Register the built-in OPENFLOW_BASIC field codecs and the experimenter
/// wildcard entry for OpenFlow 1.3.
pub fn register_defaults(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    fields::register(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CodecRegistry;
    use crate::types::{ExperimenterId, ProtocolVersion};

    fn registry() -> CodecRegistry {
        CodecRegistry::with_defaults().unwrap()
    }

    fn ctx(registry: &CodecRegistry) -> CodecContext<'_> {
        CodecContext {
            version: ProtocolVersion::V1_3,
            registry,
        }
    }

    #[test]
    fn pad_to_8_boundaries() {
        assert_eq!(pad_to_8(4), 4);
        assert_eq!(pad_to_8(8), 0);
        assert_eq!(pad_to_8(14), 2);
        assert_eq!(pad_to_8(16), 0);
    }

    #[test]
    fn unmasked_entry_round_trip() {
        let registry = registry();
        let ctx = ctx(&registry);
        let m = Match::from_fields(vec![MatchField::InPort(7), MatchField::EthType(0x86dd)]);

        let mut buf = BytesMut::new();
        m.encode(&ctx, &mut buf).unwrap();
        // 4 header + 8 in_port + 6 eth_type = 18, padded to 24
        assert_eq!(buf.len(), 24);

        let decoded = Match::decode(&ctx, &mut buf.freeze()).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn masked_entry_round_trip() {
        let registry = registry();
        let ctx = ctx(&registry);
        let m = Match::from_fields(vec![MatchField::Ipv4Dst {
            addr: [192, 168, 0, 0].into(),
            mask: Some([255, 255, 255, 0].into()),
        }]);

        let mut buf = BytesMut::new();
        m.encode(&ctx, &mut buf).unwrap();
        let decoded = Match::decode(&ctx, &mut buf.freeze()).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn payload_length_neither_n_nor_2n_is_a_length_mismatch() {
        let registry = registry();
        let ctx = ctx(&registry);

        // IPV4_SRC (field 11) with a 3-byte payload
        let mut inner = BytesMut::new();
        inner.put_u16(OXM_CLASS_OPENFLOW_BASIC);
        inner.put_u8(11 << 1);
        inner.put_u8(3);
        inner.put_slice(&[10, 0, 0]);

        let mut whole = BytesMut::new();
        whole.put_u16(MATCH_TYPE_OXM);
        whole.put_u16(4 + inner.len() as u16);
        whole.put_slice(&inner);
        whole.put_bytes(0, pad_to_8(4 + inner.len()));

        let err = Match::decode(&ctx, &mut whole.freeze()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MatchEntryLengthMismatch {
                got: 3,
                width: 4,
                masked_width: 8,
                ..
            }
        ));
    }

    #[test]
    fn masked_payload_of_2n_decodes_value_and_mask() {
        let registry = registry();
        let ctx = ctx(&registry);

        let mut inner = BytesMut::new();
        inner.put_u16(OXM_CLASS_OPENFLOW_BASIC);
        inner.put_u8((11 << 1) | 1);
        inner.put_u8(8);
        inner.put_slice(&[10, 1, 2, 0, 255, 255, 255, 0]);

        let mut whole = BytesMut::new();
        whole.put_u16(MATCH_TYPE_OXM);
        whole.put_u16(4 + inner.len() as u16);
        whole.put_slice(&inner);
        whole.put_bytes(0, pad_to_8(4 + inner.len()));

        let m = Match::decode(&ctx, &mut whole.freeze()).unwrap();
        assert_eq!(
            m.entries,
            vec![MatchField::Ipv4Src {
                addr: [10, 1, 2, 0].into(),
                mask: Some([255, 255, 255, 0].into()),
            }]
        );
    }

    #[test]
    fn unknown_field_is_distinct_from_length_mismatch() {
        let registry = registry();
        let ctx = ctx(&registry);

        // Field 77 is not registered; length is otherwise plausible
        let mut whole = BytesMut::new();
        whole.put_u16(MATCH_TYPE_OXM);
        whole.put_u16(4 + 8);
        whole.put_u16(OXM_CLASS_OPENFLOW_BASIC);
        whole.put_u8(77 << 1);
        whole.put_u8(4);
        whole.put_slice(&[0, 0, 0, 1]);
        whole.put_bytes(0, pad_to_8(12));

        let err = Match::decode(&ctx, &mut whole.freeze()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownMatchField { class: OXM_CLASS_OPENFLOW_BASIC, field: 77 }
        ));
    }

    #[test]
    fn padding_is_skipped_not_decoded() {
        let registry = registry();
        let ctx = ctx(&registry);
        let m = Match::from_fields(vec![MatchField::InPort(1)]);

        let mut buf = BytesMut::new();
        m.encode(&ctx, &mut buf).unwrap();
        // 4 + 8 = 12 bytes of content, 4 bytes of padding
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[12..], &[0, 0, 0, 0]);

        // Trailing message bytes after the padding stay untouched
        buf.put_u32(0xdddd_dddd);
        let mut bytes = buf.freeze();
        let decoded = Match::decode(&ctx, &mut bytes).unwrap();
        assert_eq!(decoded, m);
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn experimenter_entry_uses_class_wildcard_key() {
        let registry = registry();
        let ctx = ctx(&registry);
        let m = Match::from_fields(vec![MatchField::Experimenter {
            class: OXM_CLASS_EXPERIMENTER,
            field: 3,
            experimenter: ExperimenterId(0x4f4e_4600),
            masked: false,
            payload: vec![0xaa, 0xbb],
        }]);

        let mut buf = BytesMut::new();
        m.encode(&ctx, &mut buf).unwrap();
        let decoded = Match::decode(&ctx, &mut buf.freeze()).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn mask_on_unmaskable_field_is_malformed() {
        let registry = registry();
        let ctx = ctx(&registry);

        // ETH_TYPE (field 5, width 2) with has-mask set and 4-byte payload
        let mut whole = BytesMut::new();
        whole.put_u16(MATCH_TYPE_OXM);
        whole.put_u16(4 + 8);
        whole.put_u16(OXM_CLASS_OPENFLOW_BASIC);
        whole.put_u8((5 << 1) | 1);
        whole.put_u8(4);
        whole.put_slice(&[0x08, 0x00, 0xff, 0xff]);
        whole.put_bytes(0, pad_to_8(12));

        let err = Match::decode(&ctx, &mut whole.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
