//! Read-only views of per-chain round state.
//!
//! Round production lives outside the kernel; these types are the narrow
//! window the kernel needs for sync decisions and graph broadcasting.

use braid_types::{Hash, PoolInfo, SyncPoint};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A finalized round reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRound {
    pub hash: Hash,
    pub number: u64,
    /// Timestamp of the earliest snapshot in the round, in nanoseconds.
    pub start: u64,
}

/// A snapshot reference inside an in-progress round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef {
    pub hash: Hash,
    pub timestamp: u64,
}

/// The in-progress round at the head of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRound {
    pub number: u64,
    pub snapshots: Vec<SnapshotRef>,
}

impl CacheRound {
    /// Project the cache round as if it were finalized now.
    ///
    /// Returns `None` while the round holds no snapshots; an empty round has
    /// no start time and no content hash to agree on.
    pub fn as_final(&self) -> Option<FinalRound> {
        if self.snapshots.is_empty() {
            return None;
        }
        let start = self
            .snapshots
            .iter()
            .map(|s| s.timestamp)
            .min()
            .unwrap_or(0);
        let mut buf = Vec::with_capacity(self.snapshots.len() * Hash::SIZE);
        for snapshot in &self.snapshots {
            buf.extend_from_slice(snapshot.hash.as_bytes());
        }
        Some(FinalRound {
            hash: Hash::new(&buf),
            number: self.number,
            start,
        })
    }
}

/// Head state of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub final_round: FinalRound,
    pub cache_round: Option<CacheRound>,
}

/// One chain tracked by the kernel.
#[derive(Debug, Clone)]
pub struct Chain {
    pub chain_id: Hash,
    pub state: Option<ChainState>,
    pub final_index: u64,
    pub final_count: u64,
}

impl Chain {
    fn empty(chain_id: Hash) -> Self {
        Self {
            chain_id,
            state: None,
            final_index: 0,
            final_count: 0,
        }
    }
}

/// All chains the node knows about, keyed by chain id.
#[derive(Default)]
pub struct ChainsMap {
    inner: RwLock<HashMap<Hash, Chain>>,
}

impl ChainsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chain.
    pub fn put(&self, chain: Chain) {
        self.inner.write().insert(chain.chain_id, chain);
    }

    /// Ensure a chain entry exists, creating an empty one if needed, and
    /// return its current view.
    pub fn boot(&self, chain_id: Hash) -> Chain {
        self.inner
            .write()
            .entry(chain_id)
            .or_insert_with(|| Chain::empty(chain_id))
            .clone()
    }

    /// Current view of one chain.
    pub fn get(&self, chain_id: &Hash) -> Option<Chain> {
        self.inner.read().get(chain_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// The local sync graph: one point per chain with a finalized head.
    ///
    /// The read lock is held for the length of the iteration.
    pub fn build_graph(&self) -> Vec<SyncPoint> {
        let chains = self.inner.read();
        chains
            .values()
            .filter_map(|chain| {
                let state = chain.state.as_ref()?;
                Some(SyncPoint {
                    node_id: chain.chain_id,
                    hash: state.final_round.hash,
                    number: state.final_round.number,
                    pool: PoolInfo {
                        index: chain.final_index,
                        count: chain.final_count,
                    },
                })
            })
            .collect()
    }
}
