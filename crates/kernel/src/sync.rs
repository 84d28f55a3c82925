//! Sync-point tracking and the catch-up / broadcast detectors.
//!
//! Each transport generation feeds its own [`SyncPointTracker`]. Writers
//! overwrite per-peer entries under a short write lock; after each batch the
//! tracker publishes an immutable snapshot behind an `Arc`, so detectors and
//! other readers grab the handle once and never contend with writers.
//!
//! The detectors themselves are pure functions over one snapshot plus the
//! local chain head; both generations share them.

use crate::chain::ChainState;
use crate::config::SNAPSHOT_ROUND_GAP;
use crate::registry::NodeRegistry;
use braid_types::{Hash, SyncPoint};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// An immutable peer-id to sync-point mapping.
pub type SyncPointsMap = HashMap<Hash, SyncPoint>;

/// Thread-safe per-generation tracker of the latest sync point reported by
/// each peer.
pub struct SyncPointTracker {
    live: RwLock<SyncPointsMap>,
    published: RwLock<Arc<SyncPointsMap>>,
}

impl Default for SyncPointTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncPointTracker {
    pub fn new() -> Self {
        Self {
            live: RwLock::new(HashMap::new()),
            published: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Overwrite one peer's entry. Entries are never deleted; the last
    /// write wins.
    pub fn set(&self, peer_id: Hash, point: SyncPoint) {
        self.live.write().insert(peer_id, point);
    }

    /// Deep-copy the live map and publish it as the current snapshot.
    pub fn publish(&self) {
        let copy = Arc::new(self.live.read().clone());
        *self.published.write() = copy;
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<SyncPointsMap> {
        self.published.read().clone()
    }

    /// Record the points out of `points` that describe `local_id`'s chain
    /// (a peer's view of *our* chain), then republish.
    pub fn update(&self, local_id: Hash, peer_id: Hash, points: &[SyncPoint]) {
        for point in points {
            if point.node_id == local_id {
                self.set(peer_id, point.clone());
            }
        }
        self.publish();
    }
}

/// Whether our latest final round has reached a supermajority of accepted
/// peers, off by at most one round.
pub fn check_broadcasted(
    spm: &SyncPointsMap,
    head: Option<&ChainState>,
    registry: &NodeRegistry,
    now_ns: u64,
) -> bool {
    let Some(state) = head else {
        return false;
    };
    if spm.is_empty() {
        return false;
    }

    let final_number = state.final_round.number;
    let threshold = registry.consensus_threshold(now_ns, false);
    let mut count = 1usize; // ourselves
    for cn in registry.nodes_list_without_state(now_ns, true) {
        let Some(remote) = spm.get(&cn.id_for_network) else {
            continue;
        };
        if remote.number + 1 >= final_number {
            count += 1;
        }
    }
    count >= threshold
}

/// Whether we are caught up: no accepted peer is more than one round ahead,
/// and any peer exactly one round ahead agrees with our in-progress cache
/// round, which must itself be old enough to finalize.
pub fn check_catch_up(
    spm: &SyncPointsMap,
    head: Option<&ChainState>,
    registry: &NodeRegistry,
    now_ns: u64,
) -> bool {
    let Some(state) = head else {
        return false;
    };
    if spm.is_empty() {
        return false;
    }

    let threshold = registry.consensus_threshold(now_ns, false);
    let final_number = state.final_round.number;
    let cache = state.cache_round.as_ref();
    let mut updated = 1usize; // ourselves

    for cn in registry.nodes_list_without_state(now_ns, true) {
        let Some(remote) = spm.get(&cn.id_for_network) else {
            continue;
        };
        updated += 1;
        if remote.number <= final_number {
            continue;
        }
        if remote.number > final_number + 1 {
            debug!(
                local = final_number,
                peer = %cn.id_for_network,
                remote = remote.number,
                "behind peer by more than one round"
            );
            return false;
        }
        let Some(projected) = cache.and_then(|c| c.as_final()) else {
            debug!("local cache round absent or empty");
            return false;
        };
        if projected.hash != remote.hash {
            debug!(local = %projected.hash, remote = %remote.hash, "cache round disagrees with peer");
            return false;
        }
        if projected.start + SNAPSHOT_ROUND_GAP * 100 > now_ns {
            debug!(
                start = projected.start,
                now = now_ns,
                "cache round too young to finalize"
            );
            return false;
        }
    }

    if updated < threshold {
        debug!(updated, threshold, "not enough peers reporting");
    }
    updated >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CacheRound, FinalRound, SnapshotRef};
    use crate::config::NANOS_PER_SEC;
    use braid_types::{KeyPair, NodeState, PoolInfo, Signer};

    const NETWORK: Hash = Hash([9u8; 32]);
    const HOUR: u64 = 3_600 * NANOS_PER_SEC;

    fn accepted_registry(count: u8) -> NodeRegistry {
        use crate::registry::CNode;
        let mut nodes = Vec::new();
        let mut genesis = std::collections::HashSet::new();
        for seed in 0..count {
            let signer = *Signer::new(KeyPair::from_seed([seed; 32])).address();
            let id = signer.hash().for_network(NETWORK);
            genesis.insert(id);
            nodes.push(CNode {
                id_for_network: id,
                signer,
                payee: signer,
                transaction: Hash::ZERO,
                timestamp: 1_000,
                state: NodeState::Accepted,
                consensus_index: 0,
            });
        }
        NodeRegistry::new(nodes, genesis)
    }

    fn point(node_id: Hash, hash: Hash, number: u64) -> SyncPoint {
        SyncPoint {
            node_id,
            hash,
            number,
            pool: PoolInfo::default(),
        }
    }

    fn head(final_number: u64, cache: Option<CacheRound>) -> ChainState {
        ChainState {
            final_round: FinalRound {
                hash: Hash::new(b"final"),
                number: final_number,
                start: 0,
            },
            cache_round: cache,
        }
    }

    fn mature_cache(number: u64, now_ns: u64) -> CacheRound {
        CacheRound {
            number,
            snapshots: vec![SnapshotRef {
                hash: Hash::new(b"snap"),
                timestamp: now_ns.saturating_sub(SNAPSHOT_ROUND_GAP * 200),
            }],
        }
    }

    #[test]
    fn test_tracker_snapshot_is_stable_copy() {
        let tracker = SyncPointTracker::new();
        let peer = Hash::new(b"peer");
        tracker.set(peer, point(Hash::ZERO, Hash::ZERO, 1));
        tracker.publish();

        let before = tracker.snapshot();
        tracker.set(peer, point(Hash::ZERO, Hash::ZERO, 2));
        tracker.publish();

        assert_eq!(before.get(&peer).unwrap().number, 1);
        assert_eq!(tracker.snapshot().get(&peer).unwrap().number, 2);
    }

    #[test]
    fn test_tracker_update_filters_other_chains() {
        let tracker = SyncPointTracker::new();
        let local = Hash::new(b"local");
        let peer = Hash::new(b"peer");
        tracker.update(
            local,
            peer,
            &[
                point(Hash::new(b"other"), Hash::ZERO, 5),
                point(local, Hash::ZERO, 7),
            ],
        );

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&peer).unwrap().number, 7);
    }

    #[test]
    fn test_detectors_false_on_empty_inputs() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let state = head(100, None);

        let empty = SyncPointsMap::new();
        assert!(!check_broadcasted(&empty, Some(&state), &registry, now));
        assert!(!check_catch_up(&empty, Some(&state), &registry, now));

        let mut spm = SyncPointsMap::new();
        spm.insert(Hash::ZERO, point(Hash::ZERO, Hash::ZERO, 1));
        assert!(!check_broadcasted(&spm, None, &registry, now));
        assert!(!check_catch_up(&spm, None, &registry, now));
    }

    #[test]
    fn test_broadcasted_counts_peers_within_one_round() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let state = head(100, None);

        // remote numbers 99,100,100,100,100,100,98: six satisfy n+1 >= 100.
        let numbers = [99, 100, 100, 100, 100, 100, 98];
        let mut spm = SyncPointsMap::new();
        for (cn, number) in registry
            .nodes_list_without_state(now, true)
            .iter()
            .zip(numbers)
        {
            spm.insert(cn.id_for_network, point(Hash::ZERO, Hash::ZERO, number));
        }

        assert_eq!(registry.consensus_threshold(now, false), 5);
        assert!(check_broadcasted(&spm, Some(&state), &registry, now));
    }

    #[test]
    fn test_broadcasted_fails_under_threshold() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let state = head(100, None);

        // Only one peer is close enough; count = 2 < 5.
        let mut spm = SyncPointsMap::new();
        let nodes = registry.nodes_list_without_state(now, true);
        spm.insert(nodes[0].id_for_network, point(Hash::ZERO, Hash::ZERO, 100));
        for cn in &nodes[1..] {
            spm.insert(cn.id_for_network, point(Hash::ZERO, Hash::ZERO, 50));
        }
        assert!(!check_broadcasted(&spm, Some(&state), &registry, now));
    }

    #[test]
    fn test_catch_up_fast_path_and_flip() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let cache = mature_cache(101, now);
        let agreed = cache.as_final().unwrap().hash;
        let state = head(100, Some(cache));

        // Four peers one round ahead, agreeing with our cache.
        let mut spm = SyncPointsMap::new();
        let nodes = registry.nodes_list_without_state(now, true);
        for cn in nodes.iter().take(4) {
            spm.insert(cn.id_for_network, point(Hash::ZERO, agreed, 101));
        }
        assert!(check_catch_up(&spm, Some(&state), &registry, now));

        // One peer two rounds ahead flips the verdict.
        spm.insert(nodes[4].id_for_network, point(Hash::ZERO, agreed, 102));
        assert!(!check_catch_up(&spm, Some(&state), &registry, now));
    }

    #[test]
    fn test_catch_up_requires_cache_agreement() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let cache = mature_cache(101, now);
        let state = head(100, Some(cache));

        let mut spm = SyncPointsMap::new();
        let nodes = registry.nodes_list_without_state(now, true);
        for cn in nodes.iter().take(5) {
            spm.insert(
                cn.id_for_network,
                point(Hash::ZERO, Hash::new(b"divergent"), 101),
            );
        }
        assert!(!check_catch_up(&spm, Some(&state), &registry, now));
    }

    #[test]
    fn test_catch_up_rejects_young_cache_round() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let young = CacheRound {
            number: 101,
            snapshots: vec![SnapshotRef {
                hash: Hash::new(b"snap"),
                timestamp: now.saturating_sub(SNAPSHOT_ROUND_GAP * 50),
            }],
        };
        let agreed = young.as_final().unwrap().hash;
        let state = head(100, Some(young));

        let mut spm = SyncPointsMap::new();
        let nodes = registry.nodes_list_without_state(now, true);
        for cn in nodes.iter().take(5) {
            spm.insert(cn.id_for_network, point(Hash::ZERO, agreed, 101));
        }
        assert!(!check_catch_up(&spm, Some(&state), &registry, now));
    }

    #[test]
    fn test_catch_up_needs_enough_reporting_peers() {
        let registry = accepted_registry(7);
        let now = 10 * HOUR;
        let state = head(100, None);

        // Three peers at our height: updated = 4 < 5.
        let mut spm = SyncPointsMap::new();
        let nodes = registry.nodes_list_without_state(now, true);
        for cn in nodes.iter().take(3) {
            spm.insert(cn.id_for_network, point(Hash::ZERO, Hash::ZERO, 100));
        }
        assert!(!check_catch_up(&spm, Some(&state), &registry, now));

        // A fourth reporter crosses the threshold.
        spm.insert(nodes[3].id_for_network, point(Hash::ZERO, Hash::ZERO, 99));
        assert!(check_catch_up(&spm, Some(&state), &registry, now));
    }
}
