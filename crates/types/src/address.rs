//! Ledger addresses: a public spend key plus its derived view key.

use crate::{Hash, KeyPair, PublicKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing an address from its hex form.
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid address length {0}, expected 64 bytes")]
    InvalidLength(usize),

    #[error("view key does not match the spend key derivation")]
    ViewKeyMismatch,
}

/// The public half of a ledger identity.
///
/// The view key is not an independent secret: it is derived from the spend
/// key as `public_spend.deterministic_hash_derive().public()`. Constructors
/// enforce this so an `Address` is always internally consistent.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub public_spend: PublicKey,
    pub public_view: PublicKey,
}

impl Address {
    /// Build an address from a public spend key, deriving the view key.
    pub fn from_spend_public(public_spend: PublicKey) -> Self {
        let public_view = public_spend.deterministic_hash_derive().public_key();
        Self {
            public_spend,
            public_view,
        }
    }

    /// The address hash: blake3 over spend key bytes followed by view key
    /// bytes. This is the stable identity the registry and handshakes key on.
    pub fn hash(&self) -> Hash {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(self.public_spend.as_bytes());
        buf[32..].copy_from_slice(self.public_view.as_bytes());
        Hash::new(&buf)
    }

    /// The address identity scoped to one network.
    pub fn id_for_network(&self, network: Hash) -> Hash {
        self.hash().for_network(network)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            hex::encode(self.public_spend.as_bytes()),
            hex::encode(self.public_view.as_bytes())
        )
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 64 {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut spend = [0u8; 32];
        let mut view = [0u8; 32];
        spend.copy_from_slice(&bytes[..32]);
        view.copy_from_slice(&bytes[32..]);

        let addr = Address::from_spend_public(PublicKey::from_bytes(spend));
        if addr.public_view.as_bytes() != &view {
            return Err(AddressError::ViewKeyMismatch);
        }
        Ok(addr)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A full signing identity: the private spend key with the derived private
/// view key and the matching public [`Address`].
#[derive(Clone)]
pub struct Signer {
    spend: KeyPair,
    view: KeyPair,
    address: Address,
}

impl Signer {
    /// Build the signer from its private spend key. The view key pair and
    /// the public address are derived deterministically.
    pub fn new(spend: KeyPair) -> Self {
        let address = Address::from_spend_public(spend.public_key());
        let view = address.public_spend.deterministic_hash_derive();
        Self {
            spend,
            view,
            address,
        }
    }

    /// The public address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign a message hash with the private spend key.
    pub fn sign(&self, message: &Hash) -> crate::Signature {
        self.spend.sign(message)
    }

    /// The private view key pair.
    pub fn view_key(&self) -> &KeyPair {
        &self.view
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signer({})", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer(seed: u8) -> Signer {
        Signer::new(KeyPair::from_seed([seed; 32]))
    }

    #[test]
    fn test_address_round_trip() {
        let signer = test_signer(1);
        let parsed: Address = signer.address().to_string().parse().unwrap();
        assert_eq!(*signer.address(), parsed);
    }

    #[test]
    fn test_rejects_inconsistent_view_key() {
        let a = test_signer(2);
        let b = test_signer(3);
        // Splice a's spend key with b's view key.
        let spliced = format!(
            "{}{}",
            hex::encode(a.address().public_spend.as_bytes()),
            hex::encode(b.address().public_view.as_bytes())
        );
        assert_eq!(
            spliced.parse::<Address>(),
            Err(AddressError::ViewKeyMismatch)
        );
    }

    #[test]
    fn test_hash_is_stable_and_distinct() {
        let a = test_signer(4);
        let b = test_signer(5);
        assert_eq!(a.address().hash(), a.address().hash());
        assert_ne!(a.address().hash(), b.address().hash());
    }

    #[test]
    fn test_signer_signature_verifies_with_address_spend_key() {
        let signer = test_signer(6);
        let message = Hash::new(b"payload");
        let sig = signer.sign(&message);
        assert!(signer.address().public_spend.verify(&message, &sig));
    }
}
