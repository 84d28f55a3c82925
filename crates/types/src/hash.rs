//! 32-byte blake3 hash with hex encoding.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 32-byte hash.
///
/// All hashing in the ledger is blake3. The byte-wise ordering of two hashes
/// equals the lexicographic ordering of their lowercase hex encodings, so
/// `Ord` on `Hash` can stand in for hex-string comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

/// Error parsing a hash from hex.
#[derive(Debug, Error, PartialEq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid hash length {0}, expected 32 bytes")]
    InvalidLength(usize),
}

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Self = Hash([0u8; 32]);

    /// Size in bytes.
    pub const SIZE: usize = 32;

    /// Hash arbitrary data with blake3.
    pub fn new(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Construct from a slice, which must be exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, HexError> {
        if slice.len() != Self::SIZE {
            return Err(HexError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Hash(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the network-scoped form of this hash: `blake3(network ‖ self)`.
    ///
    /// Used to turn a signer address hash into an id on one specific network,
    /// so that the same key material maps to distinct ids on distinct
    /// networks.
    pub fn for_network(&self, network: Hash) -> Hash {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&network.0);
        buf[32..].copy_from_slice(&self.0);
        Hash::new(&buf)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// Debug and Display agree: a hash is always its hex form.
impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Hash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
