//! In-memory collaborators for tests: store, cache, clock and transports.

use crate::chain::ChainState;
use crate::clock::Clock;
use crate::genesis::{Genesis, GenesisNode};
use crate::store::{CacheStore, ChainHead, NodeRecord, SnapshotEntry, Store, StoreError};
use crate::transport::{LegacyTransport, Transport, TransportError};
use async_trait::async_trait;
use braid_types::{Hash, KeyPair, NodeState, Signer, Transaction};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Deterministic signer for a test seed.
pub fn test_signer(seed: u8) -> Signer {
    Signer::new(KeyPair::from_seed([seed; 32]))
}

/// A genesis descriptor over the given signers, each its own payee.
pub fn test_genesis(signers: &[Signer], epoch_sec: u64) -> Genesis {
    Genesis {
        epoch: epoch_sec,
        nodes: signers
            .iter()
            .map(|s| GenesisNode {
                signer: *s.address(),
                payee: *s.address(),
                balance: 10_000,
            })
            .collect(),
    }
}

/// Write a genesis descriptor where [`Genesis::read`] will find it.
pub fn write_genesis(dir: &Path, genesis: &Genesis) -> std::io::Result<()> {
    let encoded = serde_json::to_vec_pretty(genesis).unwrap_or_default();
    std::fs::write(dir.join(Genesis::FILE_NAME), encoded)
}

/// Accepted node records matching a genesis descriptor, timestamped at the
/// network epoch.
pub fn genesis_node_records(genesis: &Genesis) -> Vec<NodeRecord> {
    let epoch_ns = genesis.epoch * 1_000_000_000;
    genesis
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| NodeRecord {
            signer: n.signer,
            payee: n.payee,
            transaction: Hash::new(&(i as u64).to_be_bytes()),
            timestamp: epoch_ns,
            state: NodeState::Accepted,
        })
        .collect()
}

/// In-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    pub nodes: RwLock<Vec<NodeRecord>>,
    pub chain_heads: RwLock<Vec<ChainHead>>,
    pub snapshots: RwLock<Vec<SnapshotEntry>>,
    pub transactions: RwLock<HashMap<Hash, Transaction>>,
    pub cached_transactions: Mutex<Vec<Transaction>>,
    pub topology_sequence: AtomicU64,
    pub mint_batch: AtomicU64,
    pub graph_total: AtomicU64,
    pub graph_invalid: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local chain head for `chain_id`.
    pub fn set_chain_head(&self, chain_id: Hash, state: ChainState, index: u64, count: u64) {
        let mut heads = self.chain_heads.write();
        heads.retain(|h| h.chain_id != chain_id);
        heads.push(ChainHead {
            chain_id,
            state: Some(state),
            final_index: index,
            final_count: count,
        });
    }
}

impl Store for MemoryStore {
    fn validate_graph_entries(
        &self,
        _network_id: Hash,
        _parallelism: usize,
    ) -> Result<(u64, u64), StoreError> {
        Ok((
            self.graph_total.load(Ordering::SeqCst),
            self.graph_invalid.load(Ordering::SeqCst),
        ))
    }

    fn read_all_nodes(
        &self,
        threshold_ns: u64,
        include_resigning: bool,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self
            .nodes
            .read()
            .iter()
            .filter(|r| r.timestamp < threshold_ns)
            .filter(|r| include_resigning || r.state != NodeState::Resigning)
            .cloned()
            .collect())
    }

    fn read_topology_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.topology_sequence.load(Ordering::SeqCst))
    }

    fn read_last_mint_batch(&self) -> Result<u64, StoreError> {
        Ok(self.mint_batch.load(Ordering::SeqCst))
    }

    fn read_chain_heads(&self) -> Result<Vec<ChainHead>, StoreError> {
        Ok(self.chain_heads.read().clone())
    }

    fn read_snapshots_since_topology(
        &self,
        offset: u64,
        count: u64,
    ) -> Result<Vec<SnapshotEntry>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .iter()
            .filter(|s| s.topology >= offset)
            .take(count as usize)
            .cloned()
            .collect())
    }

    fn read_snapshots_for_node_round(
        &self,
        node_id: Hash,
        round: u64,
    ) -> Result<Vec<SnapshotEntry>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .iter()
            .filter(|s| s.node_id == node_id && s.round == round)
            .cloned()
            .collect())
    }

    fn read_transaction(&self, hash: Hash) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transactions.read().get(&hash).cloned())
    }

    fn cache_put_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.cached_transactions.lock().push(tx.clone());
        Ok(())
    }
}

/// In-memory [`CacheStore`].
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: &[u8], value: Vec<u8>) {
        self.entries.write().insert(key.to_vec(), value);
    }
}

/// A clock driven by the test.
pub struct ManualClock {
    ns: AtomicU64,
}

impl ManualClock {
    pub fn at_ns(ns: u64) -> Self {
        Self {
            ns: AtomicU64::new(ns),
        }
    }

    pub fn set_ns(&self, ns: u64) {
        self.ns.store(ns, Ordering::SeqCst);
    }

    pub fn advance_ns(&self, delta: u64) {
        self.ns.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.ns.load(Ordering::SeqCst)
    }
}

/// A transport that records every call and always succeeds. Implements both
/// generations.
#[derive(Default)]
pub struct RecordingTransport {
    pub graph_messages: Mutex<Vec<Hash>>,
    pub transaction_messages: Mutex<Vec<(Hash, Transaction)>>,
    pub relayer_dials: Mutex<Vec<(Hash, String)>>,
    pub neighbor_pings: Mutex<Vec<String>>,
    pub consumer_listens: AtomicUsize,
    pub neighbor_listens: AtomicUsize,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_graph_message(&self, peer_id: Hash) -> Result<(), TransportError> {
        self.graph_messages.lock().push(peer_id);
        Ok(())
    }

    async fn send_transaction_message(
        &self,
        peer_id: Hash,
        tx: &Transaction,
    ) -> Result<(), TransportError> {
        self.transaction_messages.lock().push((peer_id, tx.clone()));
        Ok(())
    }

    async fn connect_relayer(&self, peer_id: Hash, addr: &str) -> Result<(), TransportError> {
        self.relayer_dials.lock().push((peer_id, addr.to_string()));
        Ok(())
    }

    async fn listen_consumers(&self) -> Result<(), TransportError> {
        self.consumer_listens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LegacyTransport for RecordingTransport {
    async fn ping_neighbor(&self, addr: &str) -> Result<(), TransportError> {
        self.neighbor_pings.lock().push(addr.to_string());
        Ok(())
    }

    async fn listen_neighbors(&self) -> Result<(), TransportError> {
        self.neighbor_listens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
