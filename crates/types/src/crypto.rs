//! Ed25519 key and signature wrappers.
//!
//! Keys are carried as raw bytes and only lifted into curve points at
//! verification time. Wire formats contain key bytes copied verbatim, so a
//! malformed (off-curve) key must survive parsing and hashing; it simply can
//! never verify a signature.

use crate::Hash;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use std::fmt;

/// Length of an ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// An ed25519 signing key.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Build a key pair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public half.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Sign a 32-byte message hash.
    pub fn sign(&self, message: &Hash) -> Signature {
        Signature(self.signing.sign(message.as_bytes()).to_bytes())
    }

    /// The secret seed bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material.
        write!(f, "KeyPair({})", self.public_key())
    }
}

/// An ed25519 public key, stored as raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Construct from raw bytes. The bytes are not required to be a valid
    /// curve point; see the module docs.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PublicKey(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a signature over a 32-byte message hash.
    ///
    /// Returns false for off-curve keys and malleable signatures alike.
    pub fn verify(&self, message: &Hash, signature: &Signature) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        vk.verify_strict(message.as_bytes(), &sig).is_ok()
    }

    /// Derive a private key deterministically from this public key.
    ///
    /// The ledger's view keys are not independent secrets: the private view
    /// key is the blake3 hash of the public spend key, so any party holding
    /// the spend public key can reconstruct the full address.
    pub fn deterministic_hash_derive(&self) -> KeyPair {
        KeyPair::from_seed(*blake3::hash(&self.0).as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Signature(bytes)
    }

    /// Construct from a slice, which must be exactly 64 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; SIGNATURE_LENGTH] = slice.try_into().ok()?;
        Some(Signature(bytes))
    }

    /// Raw bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
