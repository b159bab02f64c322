//! Typed match-field values and the built-in field codecs.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};

use super::{
    MatchFieldCodec, RawMatchEntry, OXM_CLASS_EXPERIMENTER, OXM_CLASS_OPENFLOW_BASIC,
};
use crate::error::{CodecError, RegistryError};
use crate::registry::{CodecRegistry, MatchEntryKey};
use crate::types::{ExperimenterId, ProtocolVersion};

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// One typed, optionally masked match field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchField {
    InPort(u32),
    InPhyPort(u32),
    Metadata { value: u64, mask: Option<u64> },
    EthDst { addr: MacAddr, mask: Option<MacAddr> },
    EthSrc { addr: MacAddr, mask: Option<MacAddr> },
    EthType(u16),
    VlanVid { vid: u16, mask: Option<u16> },
    IpProto(u8),
    Ipv4Src { addr: Ipv4Addr, mask: Option<Ipv4Addr> },
    Ipv4Dst { addr: Ipv4Addr, mask: Option<Ipv4Addr> },
    TcpSrc(u16),
    TcpDst(u16),
    UdpSrc(u16),
    UdpDst(u16),
    Ipv6Src { addr: Ipv6Addr, mask: Option<Ipv6Addr> },
    Ipv6Dst { addr: Ipv6Addr, mask: Option<Ipv6Addr> },
    TunnelId { value: u64, mask: Option<u64> },
    /// Vendor-defined entry; payload kept opaque, mask flag preserved.
    Experimenter {
        class: u16,
        field: u8,
        experimenter: ExperimenterId,
        masked: bool,
        payload: Vec<u8>,
    },
}

/// OPENFLOW_BASIC field numbers.
mod basic {
    pub const IN_PORT: u8 = 0;
    pub const IN_PHY_PORT: u8 = 1;
    pub const METADATA: u8 = 2;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const VLAN_VID: u8 = 6;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
    pub const TCP_SRC: u8 = 13;
    pub const TCP_DST: u8 = 14;
    pub const UDP_SRC: u8 = 15;
    pub const UDP_DST: u8 = 16;
    pub const IPV6_SRC: u8 = 26;
    pub const IPV6_DST: u8 = 27;
    pub const TUNNEL_ID: u8 = 38;
}

impl MatchField {
    /// The OXM class this field belongs to.
    pub fn oxm_class(&self) -> u16 {
        match self {
            Self::Experimenter { class, .. } => *class,
            _ => OXM_CLASS_OPENFLOW_BASIC,
        }
    }

    /// The OXM field number within the class.
    pub fn oxm_field(&self) -> u8 {
        match self {
            Self::InPort(_) => basic::IN_PORT,
            Self::InPhyPort(_) => basic::IN_PHY_PORT,
            Self::Metadata { .. } => basic::METADATA,
            Self::EthDst { .. } => basic::ETH_DST,
            Self::EthSrc { .. } => basic::ETH_SRC,
            Self::EthType(_) => basic::ETH_TYPE,
            Self::VlanVid { .. } => basic::VLAN_VID,
            Self::IpProto(_) => basic::IP_PROTO,
            Self::Ipv4Src { .. } => basic::IPV4_SRC,
            Self::Ipv4Dst { .. } => basic::IPV4_DST,
            Self::TcpSrc(_) => basic::TCP_SRC,
            Self::TcpDst(_) => basic::TCP_DST,
            Self::UdpSrc(_) => basic::UDP_SRC,
            Self::UdpDst(_) => basic::UDP_DST,
            Self::Ipv6Src { .. } => basic::IPV6_SRC,
            Self::Ipv6Dst { .. } => basic::IPV6_DST,
            Self::TunnelId { .. } => basic::TUNNEL_ID,
            Self::Experimenter { field, .. } => *field,
        }
    }

    /// Whether the has-mask bit is set when this field is encoded.
    pub fn has_mask(&self) -> bool {
        match self {
            Self::Metadata { mask, .. } | Self::TunnelId { mask, .. } => mask.is_some(),
            Self::EthDst { mask, .. } | Self::EthSrc { mask, .. } => mask.is_some(),
            Self::VlanVid { mask, .. } => mask.is_some(),
            Self::Ipv4Src { mask, .. } | Self::Ipv4Dst { mask, .. } => mask.is_some(),
            Self::Ipv6Src { mask, .. } | Self::Ipv6Dst { mask, .. } => mask.is_some(),
            Self::Experimenter { masked, .. } => *masked,
            _ => false,
        }
    }

    /// Write value then mask, the payload layout the entry header declares.
    fn write_payload(&self, dst: &mut BytesMut) {
        match self {
            Self::InPort(port) | Self::InPhyPort(port) => dst.put_u32(*port),
            Self::Metadata { value, mask } | Self::TunnelId { value, mask } => {
                dst.put_u64(*value);
                if let Some(mask) = mask {
                    dst.put_u64(*mask);
                }
            }
            Self::EthDst { addr, mask } | Self::EthSrc { addr, mask } => {
                dst.put_slice(&addr.0);
                if let Some(mask) = mask {
                    dst.put_slice(&mask.0);
                }
            }
            Self::EthType(ethertype) => dst.put_u16(*ethertype),
            Self::VlanVid { vid, mask } => {
                dst.put_u16(*vid);
                if let Some(mask) = mask {
                    dst.put_u16(*mask);
                }
            }
            Self::IpProto(proto) => dst.put_u8(*proto),
            Self::Ipv4Src { addr, mask } | Self::Ipv4Dst { addr, mask } => {
                dst.put_slice(&addr.octets());
                if let Some(mask) = mask {
                    dst.put_slice(&mask.octets());
                }
            }
            Self::TcpSrc(port) | Self::TcpDst(port) | Self::UdpSrc(port) | Self::UdpDst(port) => {
                dst.put_u16(*port);
            }
            Self::Ipv6Src { addr, mask } | Self::Ipv6Dst { addr, mask } => {
                dst.put_slice(&addr.octets());
                if let Some(mask) = mask {
                    dst.put_slice(&mask.octets());
                }
            }
            Self::Experimenter {
                experimenter,
                payload,
                ..
            } => {
                dst.put_u32(experimenter.0);
                dst.put_slice(payload);
            }
        }
    }
}

fn be_u16(bytes: &[u8]) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(bytes);
    u16::from_be_bytes(raw)
}

fn be_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_be_bytes(raw)
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_be_bytes(raw)
}

fn mac(bytes: &[u8]) -> MacAddr {
    let mut raw = [0u8; 6];
    raw.copy_from_slice(bytes);
    MacAddr(raw)
}

fn ipv4(bytes: &[u8]) -> Ipv4Addr {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    Ipv4Addr::from(raw)
}

fn ipv6(bytes: &[u8]) -> Ipv6Addr {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(bytes);
    Ipv6Addr::from(raw)
}

/// Fixed-width field codec: the width/mask policy plus a constructor.
struct FixedFieldCodec {
    width: usize,
    maskable: bool,
    build: fn(&[u8], Option<&[u8]>) -> MatchField,
}

impl MatchFieldCodec for FixedFieldCodec {
    fn value_width(&self) -> Option<usize> {
        Some(self.width)
    }

    fn maskable(&self) -> bool {
        self.maskable
    }

    fn decode(&self, raw: &RawMatchEntry<'_>) -> Result<MatchField, CodecError> {
        Ok((self.build)(raw.value, raw.mask))
    }

    fn encode(&self, field: &MatchField, dst: &mut BytesMut) -> Result<(), CodecError> {
        field.write_payload(dst);
        Ok(())
    }
}

/// Variable-width codec for the experimenter class: payload begins with the
/// vendor id, the rest stays opaque.
struct ExperimenterFieldCodec;

impl MatchFieldCodec for ExperimenterFieldCodec {
    fn value_width(&self) -> Option<usize> {
        None
    }

    fn maskable(&self) -> bool {
        true
    }

    fn decode(&self, raw: &RawMatchEntry<'_>) -> Result<MatchField, CodecError> {
        if raw.value.len() < 4 {
            return Err(CodecError::Malformed(format!(
                "experimenter match entry payload of {} bytes lacks the vendor id",
                raw.value.len()
            )));
        }
        Ok(MatchField::Experimenter {
            class: raw.class,
            field: raw.field,
            experimenter: ExperimenterId(be_u32(&raw.value[..4])),
            masked: raw.has_mask,
            payload: raw.value[4..].to_vec(),
        })
    }

    fn encode(&self, field: &MatchField, dst: &mut BytesMut) -> Result<(), CodecError> {
        field.write_payload(dst);
        Ok(())
    }
}

/// Registration row for one OPENFLOW_BASIC field.
struct FieldSpec {
    field: u8,
    width: usize,
    maskable: bool,
    build: fn(&[u8], Option<&[u8]>) -> MatchField,
}

const BASIC_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        field: basic::IN_PORT,
        width: 4,
        maskable: false,
        build: |v, _| MatchField::InPort(be_u32(v)),
    },
    FieldSpec {
        field: basic::IN_PHY_PORT,
        width: 4,
        maskable: false,
        build: |v, _| MatchField::InPhyPort(be_u32(v)),
    },
    FieldSpec {
        field: basic::METADATA,
        width: 8,
        maskable: true,
        build: |v, m| MatchField::Metadata {
            value: be_u64(v),
            mask: m.map(be_u64),
        },
    },
    FieldSpec {
        field: basic::ETH_DST,
        width: 6,
        maskable: true,
        build: |v, m| MatchField::EthDst {
            addr: mac(v),
            mask: m.map(mac),
        },
    },
    FieldSpec {
        field: basic::ETH_SRC,
        width: 6,
        maskable: true,
        build: |v, m| MatchField::EthSrc {
            addr: mac(v),
            mask: m.map(mac),
        },
    },
    FieldSpec {
        field: basic::ETH_TYPE,
        width: 2,
        maskable: false,
        build: |v, _| MatchField::EthType(be_u16(v)),
    },
    FieldSpec {
        field: basic::VLAN_VID,
        width: 2,
        maskable: true,
        build: |v, m| MatchField::VlanVid {
            vid: be_u16(v),
            mask: m.map(be_u16),
        },
    },
    FieldSpec {
        field: basic::IP_PROTO,
        width: 1,
        maskable: false,
        build: |v, _| MatchField::IpProto(v[0]),
    },
    FieldSpec {
        field: basic::IPV4_SRC,
        width: 4,
        maskable: true,
        build: |v, m| MatchField::Ipv4Src {
            addr: ipv4(v),
            mask: m.map(ipv4),
        },
    },
    FieldSpec {
        field: basic::IPV4_DST,
        width: 4,
        maskable: true,
        build: |v, m| MatchField::Ipv4Dst {
            addr: ipv4(v),
            mask: m.map(ipv4),
        },
    },
    FieldSpec {
        field: basic::TCP_SRC,
        width: 2,
        maskable: false,
        build: |v, _| MatchField::TcpSrc(be_u16(v)),
    },
    FieldSpec {
        field: basic::TCP_DST,
        width: 2,
        maskable: false,
        build: |v, _| MatchField::TcpDst(be_u16(v)),
    },
    FieldSpec {
        field: basic::UDP_SRC,
        width: 2,
        maskable: false,
        build: |v, _| MatchField::UdpSrc(be_u16(v)),
    },
    FieldSpec {
        field: basic::UDP_DST,
        width: 2,
        maskable: false,
        build: |v, _| MatchField::UdpDst(be_u16(v)),
    },
    FieldSpec {
        field: basic::IPV6_SRC,
        width: 16,
        maskable: true,
        build: |v, m| MatchField::Ipv6Src {
            addr: ipv6(v),
            mask: m.map(ipv6),
        },
    },
    FieldSpec {
        field: basic::IPV6_DST,
        width: 16,
        maskable: true,
        build: |v, m| MatchField::Ipv6Dst {
            addr: ipv6(v),
            mask: m.map(ipv6),
        },
    },
    FieldSpec {
        field: basic::TUNNEL_ID,
        width: 8,
        maskable: true,
        build: |v, m| MatchField::TunnelId {
            value: be_u64(v),
            mask: m.map(be_u64),
        },
    },
];

pub(super) fn register(registry: &mut CodecRegistry) -> Result<(), RegistryError> {
    let version = ProtocolVersion::V1_3;
    for spec in BASIC_FIELDS {
        registry.register_match_field(
            MatchEntryKey::new(version, OXM_CLASS_OPENFLOW_BASIC, spec.field),
            Box::new(FixedFieldCodec {
                width: spec.width,
                maskable: spec.maskable,
                build: spec.build,
            }),
        )?;
    }
    registry.register_match_field(
        MatchEntryKey::class_wildcard(version, OXM_CLASS_EXPERIMENTER),
        Box::new(ExperimenterFieldCodec),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_and_field_numbers() {
        assert_eq!(MatchField::InPort(1).oxm_class(), OXM_CLASS_OPENFLOW_BASIC);
        assert_eq!(MatchField::InPort(1).oxm_field(), 0);
        assert_eq!(MatchField::TunnelId { value: 1, mask: None }.oxm_field(), 38);

        let exp = MatchField::Experimenter {
            class: OXM_CLASS_EXPERIMENTER,
            field: 9,
            experimenter: ExperimenterId(1),
            masked: false,
            payload: vec![],
        };
        assert_eq!(exp.oxm_class(), OXM_CLASS_EXPERIMENTER);
        assert_eq!(exp.oxm_field(), 9);
    }

    #[test]
    fn mask_flag_tracks_mask_presence() {
        assert!(!MatchField::Ipv4Src {
            addr: Ipv4Addr::UNSPECIFIED,
            mask: None
        }
        .has_mask());
        assert!(MatchField::Ipv4Src {
            addr: Ipv4Addr::UNSPECIFIED,
            mask: Some(Ipv4Addr::BROADCAST)
        }
        .has_mask());
        assert!(!MatchField::EthType(0x0800).has_mask());
    }

    #[test]
    fn mac_addr_display() {
        let mac = MacAddr([0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);
        assert_eq!(mac.to_string(), "02:00:5e:10:00:01");
    }

    #[test]
    fn payload_layout_is_value_then_mask() {
        let field = MatchField::Metadata {
            value: 0x0102_0304_0506_0708,
            mask: Some(0xffff_0000_0000_0000),
        };
        let mut buf = BytesMut::new();
        field.write_payload(&mut buf);
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&buf[8..10], &[0xff, 0xff]);
    }
}
