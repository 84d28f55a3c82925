//! Signed, time-bounded handshake tokens for both transport generations.
//!
//! Two wire formats coexist while the legacy transport is retired. Both are
//! bit-exact contracts shared with every other node on the network:
//!
//! ```text
//! current:  ts(8 BE) ‖ recipient_id(32) ‖ signer_pub_spend(32) ‖ is_relayer(1) ‖ signature(64)
//! legacy:   ts(8 BE) ‖ signer_pub_spend(32) ‖ signature(64) ‖ listener_bytes(*)
//! ```
//!
//! Signatures cover `blake3` of the prefix before the signature field. The
//! verifier re-derives the signer's view key from the presented spend key so
//! the address is complete before any hashing.

use crate::registry::NodeRegistry;
use braid_types::{Address, Hash, PublicKey, Signature, Signer, SIGNATURE_LENGTH};
use thiserror::Error;

/// Exact length of a current-generation handshake message.
pub const HANDSHAKE_LEN: usize = 137;
/// Length of the signed prefix of a current-generation handshake.
const HANDSHAKE_SIGNED_LEN: usize = 73;
/// Minimum length of a legacy handshake: timestamp, spend key, signature.
const LEGACY_MIN_LEN: usize = 8 + 32 + SIGNATURE_LENGTH;
/// Length of the signed prefix of a legacy handshake.
const LEGACY_SIGNED_LEN: usize = 40;
/// Hard clock-skew bound on the legacy path, in seconds.
const LEGACY_TIMEOUT_SEC: u64 = 3;

/// Why a handshake was rejected. Returned to the transport, which closes
/// the connection; never retried internally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication message malformed, {0} bytes")]
    Malformed(usize),

    #[error("authentication message timeout {ts} vs {now}")]
    Timeout { ts: u64, now: u64 },

    #[error("authentication message is for {0}, not us")]
    WrongRecipient(Hash),

    #[error("authentication peer {0} is ourselves")]
    SelfPeer(Hash),

    #[error("authentication peer {0} signer differs from registry")]
    SignerMismatch(Hash),

    #[error("authentication signature invalid for {0}")]
    BadSignature(Hash),
}

/// A verified current-generation handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub peer_id: Hash,
    /// Unix seconds the message was built at.
    pub timestamp: u64,
    pub is_relayer: bool,
    /// The full message, kept for relaying the token onward.
    pub data: Vec<u8>,
}

/// Build a current-generation handshake addressed to `recipient_id`.
pub fn build_authentication(
    signer: &Signer,
    recipient_id: Hash,
    is_relayer: bool,
    now_sec: u64,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(HANDSHAKE_LEN);
    data.extend_from_slice(&now_sec.to_be_bytes());
    data.extend_from_slice(recipient_id.as_bytes());
    data.extend_from_slice(signer.address().public_spend.as_bytes());
    data.push(is_relayer as u8);
    let digest = Hash::new(&data);
    data.extend_from_slice(&signer.sign(&digest).to_bytes());
    data
}

/// Verify a current-generation handshake addressed to `recipient_id`.
///
/// A `timeout_sec` of zero disables the freshness check.
pub fn authenticate_as(
    network_id: Hash,
    recipient_id: Hash,
    msg: &[u8],
    timeout_sec: u64,
    now_sec: u64,
) -> Result<AuthToken, AuthError> {
    if msg.len() != HANDSHAKE_LEN {
        return Err(AuthError::Malformed(msg.len()));
    }

    let ts = read_timestamp(msg);
    if timeout_sec > 0 && now_sec.abs_diff(ts) > timeout_sec {
        return Err(AuthError::Timeout { ts, now: now_sec });
    }

    let claimed = read_hash(&msg[8..40]);
    if claimed != recipient_id {
        return Err(AuthError::WrongRecipient(claimed));
    }

    let signer = read_signer_address(&msg[40..72]);
    let peer_id = signer.hash().for_network(network_id);
    if peer_id == recipient_id {
        return Err(AuthError::SelfPeer(peer_id));
    }

    let digest = Hash::new(&msg[..HANDSHAKE_SIGNED_LEN]);
    let signature = read_signature(&msg[HANDSHAKE_SIGNED_LEN..]);
    if !signer.public_spend.verify(&digest, &signature) {
        return Err(AuthError::BadSignature(peer_id));
    }

    Ok(AuthToken {
        peer_id,
        timestamp: ts,
        is_relayer: msg[72] == 1,
        data: msg.to_vec(),
    })
}

/// Build a legacy handshake carrying the local listener address.
pub fn build_legacy_authentication(signer: &Signer, listener: &str, now_sec: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(LEGACY_MIN_LEN + listener.len());
    data.extend_from_slice(&now_sec.to_be_bytes());
    data.extend_from_slice(signer.address().public_spend.as_bytes());
    let digest = Hash::new(&data);
    data.extend_from_slice(&signer.sign(&digest).to_bytes());
    data.extend_from_slice(listener.as_bytes());
    data
}

/// Verify a legacy handshake. Returns the peer id and its listener address.
///
/// The legacy path assumes tight clock sync and pins the presented signer
/// against the registry entry when one exists.
pub fn authenticate_legacy(
    network_id: Hash,
    self_id: Hash,
    registry: &NodeRegistry,
    msg: &[u8],
    now_sec: u64,
    now_ns: u64,
) -> Result<(Hash, String), AuthError> {
    if msg.len() < LEGACY_MIN_LEN {
        return Err(AuthError::Malformed(msg.len()));
    }

    let ts = read_timestamp(msg);
    if now_sec.saturating_sub(ts) > LEGACY_TIMEOUT_SEC {
        return Err(AuthError::Timeout { ts, now: now_sec });
    }

    let signer = read_signer_address(&msg[8..40]);
    let peer_id = signer.hash().for_network(network_id);
    if peer_id == self_id {
        return Err(AuthError::SelfPeer(peer_id));
    }

    if let Some(known) = registry.accepted_or_pledging_node(&peer_id, now_ns) {
        if known.signer.hash() != signer.hash() {
            return Err(AuthError::SignerMismatch(peer_id));
        }
    }

    let digest = Hash::new(&msg[..LEGACY_SIGNED_LEN]);
    let signature = read_signature(&msg[LEGACY_SIGNED_LEN..LEGACY_SIGNED_LEN + SIGNATURE_LENGTH]);
    if !signer.public_spend.verify(&digest, &signature) {
        return Err(AuthError::BadSignature(peer_id));
    }

    let listener = String::from_utf8_lossy(&msg[LEGACY_SIGNED_LEN + SIGNATURE_LENGTH..]).into_owned();
    Ok((peer_id, listener))
}

fn read_timestamp(msg: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&msg[..8]);
    u64::from_be_bytes(bytes)
}

fn read_hash(slice: &[u8]) -> Hash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(slice);
    Hash::from_bytes(bytes)
}

fn read_signer_address(slice: &[u8]) -> Address {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(slice);
    Address::from_spend_public(PublicKey::from_bytes(bytes))
}

fn read_signature(slice: &[u8]) -> Signature {
    let mut bytes = [0u8; SIGNATURE_LENGTH];
    bytes.copy_from_slice(&slice[..SIGNATURE_LENGTH]);
    Signature::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_types::KeyPair;

    const NETWORK: Hash = Hash([7u8; 32]);

    fn test_signer(seed: u8) -> Signer {
        Signer::new(KeyPair::from_seed([seed; 32]))
    }

    fn recipient() -> Hash {
        Hash::new(b"relayer")
    }

    #[test]
    fn test_handshake_round_trip() {
        let signer = test_signer(1);
        let msg = build_authentication(&signer, recipient(), true, 1_000);
        assert_eq!(msg.len(), HANDSHAKE_LEN);

        let token = authenticate_as(NETWORK, recipient(), &msg, 0, 1_000).unwrap();
        assert_eq!(token.peer_id, signer.address().hash().for_network(NETWORK));
        assert_eq!(token.timestamp, 1_000);
        assert!(token.is_relayer);
        assert_eq!(token.data, msg);
    }

    #[test]
    fn test_handshake_relayer_flag_false() {
        let signer = test_signer(1);
        let msg = build_authentication(&signer, recipient(), false, 1_000);
        let token = authenticate_as(NETWORK, recipient(), &msg, 0, 1_000).unwrap();
        assert!(!token.is_relayer);
    }

    #[test]
    fn test_handshake_wrong_length() {
        assert_eq!(
            authenticate_as(NETWORK, recipient(), &[0u8; 136], 0, 0),
            Err(AuthError::Malformed(136))
        );
        assert_eq!(
            authenticate_as(NETWORK, recipient(), &[0u8; 138], 0, 0),
            Err(AuthError::Malformed(138))
        );
    }

    #[test]
    fn test_handshake_timeout_both_directions() {
        let signer = test_signer(1);
        let msg = build_authentication(&signer, recipient(), false, 1_000);
        // Stale.
        assert_eq!(
            authenticate_as(NETWORK, recipient(), &msg, 5, 1_006),
            Err(AuthError::Timeout { ts: 1_000, now: 1_006 })
        );
        // Future-dated.
        assert_eq!(
            authenticate_as(NETWORK, recipient(), &msg, 5, 994),
            Err(AuthError::Timeout { ts: 1_000, now: 994 })
        );
        // On the bound.
        assert!(authenticate_as(NETWORK, recipient(), &msg, 5, 1_005).is_ok());
    }

    #[test]
    fn test_handshake_wrong_recipient() {
        let signer = test_signer(1);
        let msg = build_authentication(&signer, Hash::new(b"someone-else"), false, 1_000);
        assert_eq!(
            authenticate_as(NETWORK, recipient(), &msg, 0, 1_000),
            Err(AuthError::WrongRecipient(Hash::new(b"someone-else")))
        );
    }

    #[test]
    fn test_handshake_rejects_self() {
        let signer = test_signer(1);
        let self_id = signer.address().hash().for_network(NETWORK);
        let msg = build_authentication(&signer, self_id, false, 1_000);
        assert_eq!(
            authenticate_as(NETWORK, self_id, &msg, 0, 1_000),
            Err(AuthError::SelfPeer(self_id))
        );
    }

    #[test]
    fn test_handshake_any_bit_flip_rejects() {
        let signer = test_signer(1);
        let msg = build_authentication(&signer, recipient(), true, 1_000);

        for byte in 0..HANDSHAKE_LEN - SIGNATURE_LENGTH {
            for bit in 0..8u8 {
                let mut flipped = msg.clone();
                flipped[byte] ^= 1 << bit;
                let result = authenticate_as(NETWORK, recipient(), &flipped, 0, 1_000);
                assert!(result.is_err(), "flip at byte {byte} bit {bit} passed");
                // Flips outside the recipient field fail the signature; the
                // recipient field fails its own equality check first.
                if !(8..40).contains(&byte) {
                    assert!(
                        matches!(result, Err(AuthError::BadSignature(_))),
                        "flip at byte {byte} bit {bit}: {result:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_legacy_round_trip_carries_listener() {
        let signer = test_signer(2);
        let registry = NodeRegistry::empty();
        let msg = build_legacy_authentication(&signer, "192.0.2.1:7239", 1_000);

        let (peer_id, listener) =
            authenticate_legacy(NETWORK, Hash::new(b"self"), &registry, &msg, 1_000, 1_000).unwrap();
        assert_eq!(peer_id, signer.address().hash().for_network(NETWORK));
        assert_eq!(listener, "192.0.2.1:7239");
    }

    #[test]
    fn test_legacy_timeout_bound_is_three_seconds() {
        let signer = test_signer(2);
        let registry = NodeRegistry::empty();
        let msg = build_legacy_authentication(&signer, "", 1_000);

        assert!(authenticate_legacy(NETWORK, Hash::new(b"self"), &registry, &msg, 1_003, 0).is_ok());
        assert_eq!(
            authenticate_legacy(NETWORK, Hash::new(b"self"), &registry, &msg, 1_004, 0),
            Err(AuthError::Timeout { ts: 1_000, now: 1_004 })
        );
    }

    #[test]
    fn test_legacy_signer_pinned_against_registry() {
        use crate::registry::CNode;
        use braid_types::NodeState;

        let signer = test_signer(2);
        let other = test_signer(3);
        // A registry entry under the peer's id but recorded with a different
        // signer address.
        let forged = CNode {
            id_for_network: signer.address().hash().for_network(NETWORK),
            signer: *other.address(),
            payee: *other.address(),
            transaction: Hash::ZERO,
            timestamp: 100,
            state: NodeState::Accepted,
            consensus_index: 0,
        };
        let registry = NodeRegistry::new(vec![forged], Default::default());

        let msg = build_legacy_authentication(&signer, "addr", 1_000);
        assert_eq!(
            authenticate_legacy(NETWORK, Hash::new(b"self"), &registry, &msg, 1_000, 1_000),
            Err(AuthError::SignerMismatch(
                signer.address().hash().for_network(NETWORK)
            ))
        );
    }

    #[test]
    fn test_legacy_short_message_is_malformed() {
        let registry = NodeRegistry::empty();
        assert_eq!(
            authenticate_legacy(NETWORK, Hash::ZERO, &registry, &[0u8; 103], 0, 0),
            Err(AuthError::Malformed(103))
        );
    }

    #[test]
    fn test_legacy_signature_flip_rejects() {
        let signer = test_signer(2);
        let registry = NodeRegistry::empty();
        let mut msg = build_legacy_authentication(&signer, "addr", 1_000);
        msg[20] ^= 0x01;
        assert!(matches!(
            authenticate_legacy(NETWORK, Hash::new(b"self"), &registry, &msg, 1_000, 0),
            Err(AuthError::BadSignature(_))
        ));
    }
}
