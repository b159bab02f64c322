//! Version negotiation state machine.
//!
//! One instance per connection; transitions are monotonic. The machine only
//! decides; sending Hello/Error and tearing down are the adapter's job.

use tracing::{debug, warn};

use crate::error::HandshakeError;
use crate::message::{HelloElement, HelloMessage};
use crate::types::{ProtocolVersion, VersionSet};

/// Handshake progress for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Connection accepted, local Hello not yet sent.
    Init,
    /// Local Hello sent, waiting for the peer's.
    HelloSent,
    /// Version agreed; terminal for this machine.
    Negotiated(ProtocolVersion),
    /// No agreement; terminal.
    Failed(HandshakeError),
}

/// Per-connection handshake driver.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    local: VersionSet,
}

impl Handshake {
    pub fn new(local: VersionSet) -> Self {
        Self {
            state: HandshakeState::Init,
            local,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn is_negotiated(&self) -> bool {
        matches!(self.state, HandshakeState::Negotiated(_))
    }

    /// Still waiting for the peer's Hello.
    pub fn is_waiting(&self) -> bool {
        matches!(self.state, HandshakeState::HelloSent)
    }

    /// The version the local Hello header carries.
    pub fn local_hello_version(&self) -> ProtocolVersion {
        self.local.highest().unwrap_or(ProtocolVersion::V1_0)
    }

    /// Build the local Hello: a version bitmap when the highest local
    /// version can express one, the legacy empty form otherwise.
    pub fn local_hello(&self) -> HelloMessage {
        if self.local_hello_version().supports_version_bitmap() {
            HelloMessage::with_bitmap(self.local)
        } else {
            HelloMessage::legacy()
        }
    }

    /// Record that the local Hello hit the wire.
    pub fn on_hello_sent(&mut self) {
        debug_assert!(matches!(self.state, HandshakeState::Init));
        self.state = HandshakeState::HelloSent;
    }

    /// Apply the peer's Hello and settle negotiation.
    pub fn on_peer_hello(
        &mut self,
        peer_header_version: u8,
        hello: &HelloMessage,
    ) -> Result<ProtocolVersion, HandshakeError> {
        debug_assert!(matches!(self.state, HandshakeState::HelloSent));

        let result = negotiate(self.local, peer_header_version, hello);
        match &result {
            Ok(version) => {
                debug!(%version, "negotiated protocol version");
                self.state = HandshakeState::Negotiated(*version);
            }
            Err(err) => {
                warn!(%err, "version negotiation failed");
                self.state = HandshakeState::Failed(err.clone());
            }
        }
        result
    }

    /// The peer never said Hello in time.
    pub fn on_timeout(&mut self) -> HandshakeError {
        let err = HandshakeError::Timeout;
        self.state = HandshakeState::Failed(err.clone());
        err
    }
}

/// Negotiation rule.
///
/// Bitmap form: highest version set in both bitmaps. Legacy form (no
/// bitmap element): `min(local max, peer header version)`, failing when
/// the result is not locally supported.
fn negotiate(
    local: VersionSet,
    peer_header_version: u8,
    hello: &HelloMessage,
) -> Result<ProtocolVersion, HandshakeError> {
    if let Some(peer_set) = hello.version_bitmap() {
        return local
            .highest_common(peer_set)
            .ok_or_else(|| HandshakeError::NoCommonVersion {
                local: local.to_string(),
                peer: peer_set.to_string(),
            });
    }

    let peer = ProtocolVersion::from_wire(peer_header_version)
        .ok_or(HandshakeError::UnsupportedPeerVersion(peer_header_version))?;
    let local_max = local
        .highest()
        .ok_or_else(|| HandshakeError::NoCommonVersion {
            local: local.to_string(),
            peer: peer.to_string(),
        })?;

    let candidate = local_max.min(peer);
    if local.contains(candidate) {
        Ok(candidate)
    } else {
        Err(HandshakeError::NoCommonVersion {
            local: local.to_string(),
            peer: peer.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(versions: &[ProtocolVersion]) -> VersionSet {
        VersionSet::from_versions(versions)
    }

    #[test]
    fn bitmap_negotiation_picks_highest_common() {
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_3]));
        hs.on_hello_sent();

        let peer = HelloMessage::with_bitmap(set(&[
            ProtocolVersion::V1_3,
            ProtocolVersion::V1_4,
        ]));
        let version = hs.on_peer_hello(0x05, &peer).unwrap();
        assert_eq!(version, ProtocolVersion::V1_3);
        assert_eq!(hs.state(), &HandshakeState::Negotiated(ProtocolVersion::V1_3));
    }

    #[test]
    fn bitmap_negotiation_with_no_overlap_fails() {
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_0]));
        hs.on_hello_sent();

        let peer = HelloMessage::with_bitmap(set(&[ProtocolVersion::V1_4]));
        let err = hs.on_peer_hello(0x05, &peer).unwrap_err();
        assert!(matches!(err, HandshakeError::NoCommonVersion { .. }));
        assert!(matches!(hs.state(), HandshakeState::Failed(_)));
    }

    #[test]
    fn legacy_negotiation_takes_min() {
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_3]));
        hs.on_hello_sent();

        // Peer only advertises 1.0 via the header
        let version = hs
            .on_peer_hello(0x01, &HelloMessage::legacy())
            .unwrap();
        assert_eq!(version, ProtocolVersion::V1_0);
    }

    #[test]
    fn legacy_negotiation_caps_at_local_max() {
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_3]));
        hs.on_hello_sent();

        // Peer header says 1.5; min(1.3, 1.5) = 1.3
        let version = hs
            .on_peer_hello(0x06, &HelloMessage::legacy())
            .unwrap();
        assert_eq!(version, ProtocolVersion::V1_3);
    }

    #[test]
    fn legacy_negotiation_fails_on_gap_in_local_set() {
        // Local supports 1.0 and 1.3 but not 1.1; legacy peer at 1.1 fails
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_3]));
        hs.on_hello_sent();

        let err = hs
            .on_peer_hello(0x02, &HelloMessage::legacy())
            .unwrap_err();
        assert!(matches!(err, HandshakeError::NoCommonVersion { .. }));
    }

    #[test]
    fn unknown_peer_wire_version_fails() {
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_3]));
        hs.on_hello_sent();

        let err = hs
            .on_peer_hello(0x63, &HelloMessage::legacy())
            .unwrap_err();
        assert_eq!(err, HandshakeError::UnsupportedPeerVersion(0x63));
    }

    #[test]
    fn timeout_transitions_to_failed() {
        let mut hs = Handshake::new(set(&[ProtocolVersion::V1_3]));
        hs.on_hello_sent();
        assert!(hs.is_waiting());

        let err = hs.on_timeout();
        assert_eq!(err, HandshakeError::Timeout);
        assert!(matches!(hs.state(), HandshakeState::Failed(_)));
        assert!(!hs.is_waiting());
    }

    #[test]
    fn local_hello_form_follows_highest_version() {
        let modern = Handshake::new(set(&[ProtocolVersion::V1_0, ProtocolVersion::V1_3]));
        assert!(modern.local_hello().version_bitmap().is_some());
        assert_eq!(modern.local_hello_version(), ProtocolVersion::V1_3);

        let legacy = Handshake::new(set(&[ProtocolVersion::V1_0]));
        assert!(legacy.local_hello().version_bitmap().is_none());
        assert_eq!(legacy.local_hello_version(), ProtocolVersion::V1_0);
    }
}
