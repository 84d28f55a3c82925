//! Sync points: a peer's latest view of one chain in the round graph.

use crate::Hash;
use serde::{Deserialize, Serialize};

/// Final-round pool position carried alongside a sync point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub index: u64,
    pub count: u64,
}

/// A peer's latest reported final-round reference for one chain.
///
/// Both transport generations carry this structure; the wire encodings
/// differ but the fields are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPoint {
    /// The chain this point refers to.
    pub node_id: Hash,
    /// Hash of the chain's latest final round.
    pub hash: Hash,
    /// Number of the chain's latest final round.
    pub number: u64,
    /// Snapshot pool position.
    pub pool: PoolInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let point = SyncPoint {
            node_id: Hash::new(b"chain"),
            hash: Hash::new(b"round"),
            number: 42,
            pool: PoolInfo { index: 3, count: 9 },
        };
        let encoded = serde_json::to_string(&point).unwrap();
        let decoded: SyncPoint = serde_json::from_str(&encoded).unwrap();
        assert_eq!(point, decoded);
    }
}
