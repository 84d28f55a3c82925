//! The node kernel: boot glue and runtime entry points.
//!
//! [`Node::setup`] performs the boot sequence in a fixed order, every step
//! fatal on failure:
//!
//! 1. Derive the signer identity from the configured private spend key.
//! 2. Read the last mint distribution batch.
//! 3. Load the genesis descriptor, fixing the network id and our own id.
//! 4. Seed the topology counter from the store.
//! 5. Validate the whole persistent graph against the network id.
//! 6. Materialize the consensus node registry and its sequence indexes.
//! 7. Load per-chain head state and the graph timestamp.
//! 8. Boot the local chain.
//!
//! [`Node::start`] then launches the transports and the graph pusher under
//! the node-wide cancellation token and hands the task handles back so the
//! embedder can join them on teardown.

use crate::auth::{self, AuthError, AuthToken};
use crate::chain::{Chain, ChainState, ChainsMap};
use crate::clock::Clock;
use crate::config::{KernelConfig, NANOS_PER_SEC};
use crate::error::KernelError;
use crate::genesis::Genesis;
use crate::pusher;
use crate::registry::{CNode, NodeRegistry};
use crate::store::{CacheStore, SnapshotEntry, Store};
use crate::sync::{check_broadcasted, check_catch_up, SyncPointTracker, SyncPointsMap};
use crate::transport::{LegacyTransport, Transport};
use braid_types::{Hash, Signer, SyncPoint, Transaction};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Parallelism for boot-time graph validation.
const GRAPH_VALIDATION_PARALLELISM: usize = 10;

/// Monotonic topological-order dispenser, seeded from the store at boot.
pub struct TopologyCounter {
    seq: AtomicU64,
}

impl TopologyCounter {
    fn new(seq: u64) -> Self {
        Self {
            seq: AtomicU64::new(seq),
        }
    }

    /// Hand out the next topological order.
    pub fn next(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The last assigned order.
    pub fn current(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }
}

/// The kernel of one braid node.
pub struct Node {
    id_for_network: Hash,
    signer: Signer,
    is_relayer: bool,
    listener: String,
    listen_addr: String,
    network_id: Hash,
    /// Network start time in nanoseconds.
    epoch: u64,
    genesis_nodes: Vec<Hash>,
    genesis_map: HashSet<Hash>,
    seeds: Vec<(Hash, String)>,
    legacy_peers: Vec<String>,

    registry: RwLock<Arc<NodeRegistry>>,
    sync_points: SyncPointTracker,
    legacy_sync_points: SyncPointTracker,
    chains: ChainsMap,
    topology: TopologyCounter,
    last_mint: AtomicU64,
    graph_timestamp: AtomicU64,

    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    legacy_transport: Arc<dyn LegacyTransport>,
    clock: Arc<dyn Clock>,

    started_at: Instant,
    shutdown: CancellationToken,
}

impl Node {
    /// Boot the kernel. See the module docs for the step ordering; any
    /// failure aborts the boot.
    pub fn setup(
        config: KernelConfig,
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
        legacy_transport: Arc<dyn LegacyTransport>,
        clock: Arc<dyn Clock>,
        dir: &Path,
    ) -> Result<Arc<Self>, KernelError> {
        let signer = Signer::new(config.signer.clone());

        let last_mint = store.read_last_mint_batch()?;

        let genesis = Genesis::read(dir)?;
        let network_id = genesis.network_id();
        let id_for_network = signer.address().id_for_network(network_id);
        let genesis_nodes = genesis.node_ids(network_id);
        let genesis_map: HashSet<Hash> = genesis_nodes.iter().copied().collect();
        let epoch = genesis.epoch.saturating_mul(NANOS_PER_SEC);

        let seeds = parse_seeds(&config.seeds, id_for_network)?;

        let topology = TopologyCounter::new(store.read_topology_sequence()?);

        info!("validating graph entries");
        let validation_started = Instant::now();
        let (total, invalid) =
            store.validate_graph_entries(network_id, GRAPH_VALIDATION_PARALLELISM)?;
        if invalid > 0 {
            return Err(KernelError::GraphInvalid { total, invalid });
        }
        info!(total, elapsed = ?validation_started.elapsed(), "graph validated");

        let node = Node {
            id_for_network,
            signer,
            is_relayer: config.relayer,
            listener: config.legacy_listener,
            listen_addr: config.listen_addr,
            network_id,
            epoch,
            genesis_nodes,
            genesis_map,
            seeds,
            legacy_peers: config.legacy_peers,
            registry: RwLock::new(Arc::new(NodeRegistry::empty())),
            sync_points: SyncPointTracker::new(),
            legacy_sync_points: SyncPointTracker::new(),
            chains: ChainsMap::new(),
            topology,
            last_mint: AtomicU64::new(last_mint),
            graph_timestamp: AtomicU64::new(0),
            store,
            cache,
            transport,
            legacy_transport,
            clock,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
        };

        node.load_consensus_nodes()?;
        node.load_all_chains()?;
        node.chains.boot(node.id_for_network);

        info!(
            listen = %node.listen_addr,
            signer = %node.signer.address(),
            network = %node.network_id,
            node = %node.id_for_network,
            topology = node.topology.current(),
            "kernel ready"
        );
        Ok(Arc::new(node))
    }

    /// Rebuild the registry and both sequence indexes from the store.
    ///
    /// The threshold doubles the current time so every record ever written
    /// is included, future-dated timestamps included; the multiply saturates
    /// rather than wrapping near the end of the u64 range.
    pub fn load_consensus_nodes(&self) -> Result<(), KernelError> {
        let threshold = self.clock.now_ns().saturating_mul(2);
        let records = self.store.read_all_nodes(threshold, true)?;
        let mut nodes = Vec::with_capacity(records.len());
        for record in records {
            let cn = CNode {
                id_for_network: record.id_for_network(self.network_id),
                signer: record.signer,
                payee: record.payee,
                transaction: record.transaction,
                timestamp: record.timestamp,
                state: record.state,
                consensus_index: 0,
            };
            info!(id = %cn.id_for_network, state = %cn.state, timestamp = cn.timestamp, "consensus node");
            nodes.push(cn);
        }
        let registry = NodeRegistry::new(nodes, self.genesis_map.clone());
        *self.registry.write() = Arc::new(registry);
        Ok(())
    }

    fn load_all_chains(&self) -> Result<(), KernelError> {
        let heads = self.store.read_chain_heads()?;
        let mut graph_timestamp = 0u64;
        for head in heads {
            if let Some(state) = &head.state {
                graph_timestamp = graph_timestamp.max(state.final_round.start);
            }
            self.chains.put(Chain {
                chain_id: head.chain_id,
                state: head.state,
                final_index: head.final_index,
                final_count: head.final_count,
            });
        }
        self.graph_timestamp.store(graph_timestamp, Ordering::SeqCst);
        Ok(())
    }

    /// Launch the transports and the graph pusher. The returned handles
    /// complete once [`Node::stop`] fires the cancellation token.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for (relayer_id, addr) in self.seeds.clone() {
            let node = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = node.transport.connect_relayer(relayer_id, &addr).await {
                    warn!(relayer = %relayer_id, addr = %addr, %err, "relayer connect failed");
                }
            }));
        }

        if self.is_relayer {
            let node = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = node.transport.listen_consumers().await {
                    error!(%err, "consumer listener failed");
                    node.shutdown.cancel();
                }
            }));
        }

        for addr in self.legacy_peers.clone() {
            if addr == self.listener {
                continue;
            }
            let node = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = node.legacy_transport.ping_neighbor(&addr).await {
                    debug!(addr = %addr, %err, "neighbor ping failed");
                }
            }));
        }

        if !self.listener.is_empty() {
            let node = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = node.legacy_transport.listen_neighbors().await {
                    error!(%err, "neighbor listener failed");
                    node.shutdown.cancel();
                }
            }));
        }

        let node = self.clone();
        handles.push(tokio::spawn(pusher::run(node)));

        handles
    }

    /// Fire the node-wide cancellation token. Background tasks finish their
    /// in-flight work and stop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// The node-wide cancellation token, for background tasks and embedders
    /// coordinating teardown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Sleep for `wait` unless the node shuts down first. Returns true on
    /// shutdown.
    pub async fn wait_or_done(&self, wait: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = tokio::time::sleep(wait) => false,
        }
    }

    // ── registry views ─────────────────────────────────────────────────

    /// The current registry snapshot. Cheap; reloads swap the pointer.
    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.read().clone()
    }

    /// The node set just before `threshold`.
    pub fn nodes_list_without_state(
        &self,
        threshold: u64,
        accepted_only: bool,
    ) -> Vec<Arc<CNode>> {
        self.registry()
            .nodes_list_without_state(threshold, accepted_only)
            .to_vec()
    }

    /// Ids of every node known as of now, regardless of state.
    pub fn read_all_nodes_without_state(&self) -> Vec<Hash> {
        self.nodes_list_without_state(self.clock.now_ns(), false)
            .iter()
            .map(|cn| cn.id_for_network)
            .collect()
    }

    pub fn pledging_node(&self, timestamp: u64) -> Option<Arc<CNode>> {
        self.registry().pledging_node(timestamp)
    }

    pub fn get_accepted_or_pledging_node(&self, id: &Hash) -> Option<Arc<CNode>> {
        self.registry()
            .accepted_or_pledging_node(id, self.clock.now_ns())
    }

    pub fn get_removed_or_cancelled_node(&self, id: &Hash, timestamp: u64) -> Option<Arc<CNode>> {
        self.registry().removed_or_cancelled_node(id, timestamp)
    }

    /// Whether an accepted node may sign as of `timestamp`.
    pub fn consensus_ready(&self, cn: &CNode, timestamp: u64) -> bool {
        self.registry().consensus_ready(cn, timestamp)
    }

    /// The BFT supermajority over the qualified base at `timestamp`.
    pub fn consensus_threshold(&self, timestamp: u64, finalizing: bool) -> usize {
        self.registry().consensus_threshold(timestamp, finalizing)
    }

    // ── peer authentication ────────────────────────────────────────────

    /// Build a handshake addressed to `recipient_id`.
    pub fn build_authentication_message(&self, recipient_id: Hash) -> Vec<u8> {
        auth::build_authentication(
            &self.signer,
            recipient_id,
            self.is_relayer,
            self.clock.now_sec(),
        )
    }

    /// Verify a handshake addressed to `recipient_id`. A zero timeout
    /// disables the freshness check.
    pub fn authenticate_as(
        &self,
        recipient_id: Hash,
        msg: &[u8],
        timeout_sec: u64,
    ) -> Result<AuthToken, AuthError> {
        auth::authenticate_as(
            self.network_id,
            recipient_id,
            msg,
            timeout_sec,
            self.clock.now_sec(),
        )
    }

    /// Build a legacy handshake carrying our listener address.
    pub fn build_legacy_authentication_message(&self) -> Vec<u8> {
        auth::build_legacy_authentication(&self.signer, &self.listener, self.clock.now_sec())
    }

    /// Verify a legacy handshake. Returns the peer id and its listener.
    pub fn authenticate_legacy(&self, msg: &[u8]) -> Result<(Hash, String), AuthError> {
        auth::authenticate_legacy(
            self.network_id,
            self.id_for_network,
            &self.registry(),
            msg,
            self.clock.now_sec(),
            self.clock.now_ns(),
        )
    }

    // ── sync points and liveness ───────────────────────────────────────

    /// Record a peer's reported points about our chain, current generation.
    pub fn update_sync_points(&self, peer_id: Hash, points: &[SyncPoint]) {
        self.sync_points.update(self.id_for_network, peer_id, points);
    }

    /// Record a peer's reported points about our chain, legacy generation.
    pub fn update_legacy_sync_points(&self, peer_id: Hash, points: &[SyncPoint]) {
        self.legacy_sync_points
            .update(self.id_for_network, peer_id, points);
    }

    pub fn sync_points_snapshot(&self) -> Arc<SyncPointsMap> {
        self.sync_points.snapshot()
    }

    pub fn legacy_sync_points_snapshot(&self) -> Arc<SyncPointsMap> {
        self.legacy_sync_points.snapshot()
    }

    fn chain_head(&self) -> Option<ChainState> {
        self.chains.get(&self.id_for_network).and_then(|c| c.state)
    }

    /// Whether either transport generation confirms our latest final round
    /// reached a supermajority of accepted peers.
    pub fn check_broadcasted_to_peers(&self) -> bool {
        self.check_broadcasted_to_p2p_peers() || self.check_broadcasted_to_legacy_peers()
    }

    pub fn check_broadcasted_to_p2p_peers(&self) -> bool {
        let head = self.chain_head();
        check_broadcasted(
            &self.sync_points.snapshot(),
            head.as_ref(),
            &self.registry(),
            self.clock.now_ns(),
        )
    }

    pub fn check_broadcasted_to_legacy_peers(&self) -> bool {
        let head = self.chain_head();
        check_broadcasted(
            &self.legacy_sync_points.snapshot(),
            head.as_ref(),
            &self.registry(),
            self.clock.now_ns(),
        )
    }

    /// Whether either transport generation confirms we are caught up with
    /// the accepted peers.
    pub fn check_catch_up_with_peers(&self) -> bool {
        self.check_catch_up_with_p2p_peers() || self.check_catch_up_with_legacy_peers()
    }

    pub fn check_catch_up_with_p2p_peers(&self) -> bool {
        let head = self.chain_head();
        check_catch_up(
            &self.sync_points.snapshot(),
            head.as_ref(),
            &self.registry(),
            self.clock.now_ns(),
        )
    }

    pub fn check_catch_up_with_legacy_peers(&self) -> bool {
        let head = self.chain_head();
        check_catch_up(
            &self.legacy_sync_points.snapshot(),
            head.as_ref(),
            &self.registry(),
            self.clock.now_ns(),
        )
    }

    // ── graph and transactions ─────────────────────────────────────────

    /// The local sync graph: one point per chain with a finalized head.
    pub fn build_graph(&self) -> Vec<SyncPoint> {
        self.chains.build_graph()
    }

    /// Send a finalized transaction to a peer. Unknown hashes are a silent
    /// no-op; transport failures are logged and skipped.
    pub async fn send_transaction_to_peer(
        &self,
        peer_id: Hash,
        hash: Hash,
    ) -> Result<(), KernelError> {
        let Some(tx) = self.store.read_transaction(hash)? else {
            return Ok(());
        };
        if let Err(err) = self.transport.send_transaction_message(peer_id, &tx).await {
            warn!(peer = %peer_id, tx = %hash, %err, "transaction send failed");
        }
        Ok(())
    }

    /// Stage a transaction received from a peer into the cache pool.
    pub fn cache_put_transaction(&self, tx: &Transaction) -> Result<(), KernelError> {
        self.store.cache_put_transaction(tx).map_err(Into::into)
    }

    pub fn read_snapshots_since_topology(
        &self,
        offset: u64,
        count: u64,
    ) -> Result<Vec<SnapshotEntry>, KernelError> {
        self.store
            .read_snapshots_since_topology(offset, count)
            .map_err(Into::into)
    }

    pub fn read_snapshots_for_node_round(
        &self,
        node_id: Hash,
        round: u64,
    ) -> Result<Vec<SnapshotEntry>, KernelError> {
        self.store
            .read_snapshots_for_node_round(node_id, round)
            .map_err(Into::into)
    }

    /// Ping freshly learned legacy neighbors, skipping our own listener.
    pub async fn update_neighbors(&self, neighbors: &[String]) {
        for addr in neighbors {
            if *addr == self.listener {
                continue;
            }
            if let Err(err) = self.legacy_transport.ping_neighbor(addr).await {
                debug!(addr = %addr, %err, "neighbor ping failed");
            }
        }
    }

    // ── accessors ──────────────────────────────────────────────────────

    pub fn id_for_network(&self) -> Hash {
        self.id_for_network
    }

    pub fn network_id(&self) -> Hash {
        self.network_id
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn is_relayer(&self) -> bool {
        self.is_relayer
    }

    /// Network start time in nanoseconds.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Genesis node ids in descriptor order.
    pub fn genesis_nodes(&self) -> &[Hash] {
        &self.genesis_nodes
    }

    pub fn topology(&self) -> &TopologyCounter {
        &self.topology
    }

    /// Batch number of the last mint distribution.
    pub fn last_mint(&self) -> u64 {
        self.last_mint.load(Ordering::SeqCst)
    }

    /// Timestamp of the newest final round seen at boot.
    pub fn graph_timestamp(&self) -> u64 {
        self.graph_timestamp.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

fn parse_seeds(seeds: &[String], self_id: Hash) -> Result<Vec<(Hash, String)>, KernelError> {
    let mut parsed = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let Some((id_hex, addr)) = seed.split_once('@') else {
            return Err(KernelError::Config(format!("invalid relayer seed {seed}")));
        };
        let relayer_id: Hash = id_hex
            .parse()
            .map_err(|_| KernelError::Config(format!("invalid relayer seed id {seed}")))?;
        if relayer_id == self_id {
            continue;
        }
        parsed.push((relayer_id, addr.to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seeds_skips_self_and_rejects_garbage() {
        let self_id = Hash::new(b"self");
        let other = Hash::new(b"other");
        let seeds = vec![
            format!("{self_id}@192.0.2.1:7239"),
            format!("{other}@192.0.2.2:7239"),
        ];
        let parsed = parse_seeds(&seeds, self_id).unwrap();
        assert_eq!(parsed, vec![(other, "192.0.2.2:7239".to_string())]);

        assert!(parse_seeds(&["no-separator".to_string()], self_id).is_err());
        assert!(parse_seeds(&["zz@addr".to_string()], self_id).is_err());
    }

    #[test]
    fn test_topology_counter_is_sequential() {
        let counter = TopologyCounter::new(41);
        assert_eq!(counter.current(), 41);
        assert_eq!(counter.next(), 42);
        assert_eq!(counter.next(), 43);
        assert_eq!(counter.current(), 43);
    }
}
