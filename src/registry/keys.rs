//! Composite dispatch keys for the codec registry.
//!
//! All three key types treat an absent component as a normal, comparable
//! value: absent equals absent and never equals any present value. This is
//! what lets wildcard experimenter match entries and standard messages share
//! one table without ambient null semantics.

use std::fmt;

use crate::message::MessageKind;
use crate::types::{ExperimenterId, ProtocolVersion};

/// Key for inbound dispatch: wire-level message type code per version,
/// refined by the experimenter id for vendor extension messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeserializerKey {
    pub version: ProtocolVersion,
    pub msg_type: u8,
    pub experimenter: Option<ExperimenterId>,
}

impl DeserializerKey {
    pub fn new(version: ProtocolVersion, msg_type: u8) -> Self {
        Self {
            version,
            msg_type,
            experimenter: None,
        }
    }

    pub fn experimenter(
        version: ProtocolVersion,
        msg_type: u8,
        experimenter: ExperimenterId,
    ) -> Self {
        Self {
            version,
            msg_type,
            experimenter: Some(experimenter),
        }
    }
}

impl fmt::Display for DeserializerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deserializer(v{}, type {}", self.version, self.msg_type)?;
        if let Some(id) = self.experimenter {
            write!(f, ", experimenter {id}")?;
        }
        write!(f, ")")
    }
}

/// Key for outbound dispatch: the logical kind being encoded, not a wire
/// code, since wire codes differ across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerializerKey {
    pub version: ProtocolVersion,
    pub kind: MessageKind,
    pub experimenter: Option<ExperimenterId>,
}

impl SerializerKey {
    pub fn new(version: ProtocolVersion, kind: MessageKind) -> Self {
        Self {
            version,
            kind,
            experimenter: None,
        }
    }

    pub fn experimenter(
        version: ProtocolVersion,
        kind: MessageKind,
        experimenter: ExperimenterId,
    ) -> Self {
        Self {
            version,
            kind,
            experimenter: Some(experimenter),
        }
    }
}

impl fmt::Display for SerializerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "serializer(v{}, {}", self.version, self.kind)?;
        if let Some(id) = self.experimenter {
            write!(f, ", experimenter {id}")?;
        }
        write!(f, ")")
    }
}

/// Key identifying the codec for one typed match field.
///
/// Experimenter entries register with `field: None`, a wildcard across the
/// vendor's field space; `class: None` is likewise a distinct key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchEntryKey {
    pub version: ProtocolVersion,
    pub oxm_class: Option<u16>,
    pub oxm_field: Option<u8>,
}

impl MatchEntryKey {
    pub fn new(version: ProtocolVersion, oxm_class: u16, oxm_field: u8) -> Self {
        Self {
            version,
            oxm_class: Some(oxm_class),
            oxm_field: Some(oxm_field),
        }
    }

    /// Wildcard over every field of a class.
    pub fn class_wildcard(version: ProtocolVersion, oxm_class: u16) -> Self {
        Self {
            version,
            oxm_class: Some(oxm_class),
            oxm_field: None,
        }
    }
}

impl fmt::Display for MatchEntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match-entry(v{}", self.version)?;
        match self.oxm_class {
            Some(c) => write!(f, ", class {c:#06x}")?,
            None => write!(f, ", class -")?,
        }
        match self.oxm_field {
            Some(fld) => write!(f, ", field {fld}")?,
            None => write!(f, ", field -")?,
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    const OPENFLOW_BASIC: u16 = 0x8000;
    const NXM_0: u16 = 0x0000;
    const IN_PORT: u8 = 0;
    const IN_PHY_PORT: u8 = 1;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn match_entry_key_equality_and_hash() {
        let key1 = MatchEntryKey::new(ProtocolVersion::V1_3, OPENFLOW_BASIC, IN_PORT);
        let key2 = MatchEntryKey::new(ProtocolVersion::V1_3, OPENFLOW_BASIC, IN_PORT);
        assert_eq!(key1, key2);
        assert_eq!(hash_of(&key1), hash_of(&key2));

        // Changing any single component yields inequality.
        let other_field = MatchEntryKey::new(ProtocolVersion::V1_3, OPENFLOW_BASIC, IN_PHY_PORT);
        assert_ne!(key1, other_field);

        let other_class = MatchEntryKey::new(ProtocolVersion::V1_3, NXM_0, IN_PORT);
        assert_ne!(key1, other_class);

        let other_version = MatchEntryKey::new(ProtocolVersion::V1_0, OPENFLOW_BASIC, IN_PORT);
        assert_ne!(key1, other_version);
    }

    #[test]
    fn match_entry_key_absent_components() {
        let present = MatchEntryKey::new(ProtocolVersion::V1_3, OPENFLOW_BASIC, IN_PORT);
        let absent_field = MatchEntryKey::class_wildcard(ProtocolVersion::V1_3, OPENFLOW_BASIC);
        let absent_class = MatchEntryKey {
            version: ProtocolVersion::V1_3,
            oxm_class: None,
            oxm_field: Some(IN_PORT),
        };

        // Absent vs present never compare equal.
        assert_ne!(present, absent_field);
        assert_ne!(present, absent_class);
        assert_ne!(absent_field, absent_class);

        // Absent components on both sides are equal and hash together.
        let absent_field2 = MatchEntryKey::class_wildcard(ProtocolVersion::V1_3, OPENFLOW_BASIC);
        assert_eq!(absent_field, absent_field2);
        assert_eq!(hash_of(&absent_field), hash_of(&absent_field2));
    }

    #[test]
    fn deserializer_key_experimenter_component() {
        let plain = DeserializerKey::new(ProtocolVersion::V1_3, 4);
        let vendor1 =
            DeserializerKey::experimenter(ProtocolVersion::V1_3, 4, ExperimenterId(0x2320));
        let vendor2 =
            DeserializerKey::experimenter(ProtocolVersion::V1_3, 4, ExperimenterId(0x4f4e4600));

        assert_ne!(plain, vendor1);
        assert_ne!(vendor1, vendor2);
        assert_eq!(
            vendor1,
            DeserializerKey::experimenter(ProtocolVersion::V1_3, 4, ExperimenterId(0x2320))
        );
        assert_eq!(plain, DeserializerKey::new(ProtocolVersion::V1_3, 4));
    }

    #[test]
    fn serializer_key_distinct_by_kind_and_version() {
        let key = SerializerKey::new(ProtocolVersion::V1_3, MessageKind::BarrierRequest);
        assert_eq!(
            key,
            SerializerKey::new(ProtocolVersion::V1_3, MessageKind::BarrierRequest)
        );
        assert_ne!(
            key,
            SerializerKey::new(ProtocolVersion::V1_0, MessageKind::BarrierRequest)
        );
        assert_ne!(
            key,
            SerializerKey::new(ProtocolVersion::V1_3, MessageKind::BarrierReply)
        );
    }
}
