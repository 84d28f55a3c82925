//! Opaque transaction view.

use crate::Hash;

/// A transaction as the kernel sees it: a content hash plus the raw encoded
/// payload. Semantics live outside the kernel; this is only ferried between
/// the store and the transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash,
    pub raw: Vec<u8>,
}

impl Transaction {
    /// Wrap raw encoded bytes, hashing them for identity.
    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self {
            hash: Hash::new(&raw),
            raw,
        }
    }
}
