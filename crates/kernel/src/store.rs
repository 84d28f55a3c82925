//! Contracts for the persistent graph store and the in-memory cache store.
//!
//! All store operations are synchronous blocking I/O. Callers in async
//! contexts should use `spawn_blocking` if needed to avoid blocking the
//! runtime.

use crate::chain::ChainState;
use braid_types::{Address, Hash, NodeState, Transaction};
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o: {0}")]
    Io(String),
}

/// A consensus node entry as persisted on the graph.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub signer: Address,
    pub payee: Address,
    /// Hash of the on-graph transaction that caused this state entry.
    pub transaction: Hash,
    /// Nanosecond timestamp of the state entry.
    pub timestamp: u64,
    pub state: NodeState,
}

impl NodeRecord {
    /// The record's node identity on the given network.
    pub fn id_for_network(&self, network: Hash) -> Hash {
        self.signer.id_for_network(network)
    }
}

/// Head state of one chain as persisted.
#[derive(Debug, Clone)]
pub struct ChainHead {
    pub chain_id: Hash,
    pub state: Option<ChainState>,
    pub final_index: u64,
    pub final_count: u64,
}

/// A snapshot reference with its topological order.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub hash: Hash,
    pub node_id: Hash,
    pub round: u64,
    pub timestamp: u64,
    pub topology: u64,
}

/// The persistent graph and snapshot store, consumed by the kernel.
pub trait Store: Send + Sync {
    /// Validate every graph entry against the network id with the given
    /// parallelism. Returns `(total, invalid)` entry counts.
    fn validate_graph_entries(
        &self,
        network_id: Hash,
        parallelism: usize,
    ) -> Result<(u64, u64), StoreError>;

    /// All node entries with `timestamp < threshold_ns`, optionally
    /// including resigning nodes.
    fn read_all_nodes(
        &self,
        threshold_ns: u64,
        include_resigning: bool,
    ) -> Result<Vec<NodeRecord>, StoreError>;

    /// The highest assigned topological order.
    fn read_topology_sequence(&self) -> Result<u64, StoreError>;

    /// The batch number of the last mint distribution.
    fn read_last_mint_batch(&self) -> Result<u64, StoreError>;

    /// Head state of every chain with at least one round.
    fn read_chain_heads(&self) -> Result<Vec<ChainHead>, StoreError>;

    /// Snapshots in topological order starting at `offset`, at most `count`.
    fn read_snapshots_since_topology(
        &self,
        offset: u64,
        count: u64,
    ) -> Result<Vec<SnapshotEntry>, StoreError>;

    /// Snapshots of one chain round.
    fn read_snapshots_for_node_round(
        &self,
        node_id: Hash,
        round: u64,
    ) -> Result<Vec<SnapshotEntry>, StoreError>;

    /// A finalized transaction, if present.
    fn read_transaction(&self, hash: Hash) -> Result<Option<Transaction>, StoreError>;

    /// Stage a transaction into the cache pool.
    fn cache_put_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;
}

/// The in-memory cache store, consumed by the kernel and shared with round
/// producers.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&self, key: &[u8], value: Vec<u8>);
}
