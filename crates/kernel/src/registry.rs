//! The consensus node registry and its timestamp-indexed views.
//!
//! The registry is an immutable snapshot of every node entry ever recorded,
//! in canonical order. From it two sequence arrays are precomputed, one per
//! `accepted_only` flag; entry *i* answers "what was the node set just after
//! event *i* took place". Policy callers ask that question constantly, so
//! lookups are a binary search over the precomputed arrays instead of a scan
//! of the full history.
//!
//! A state change never mutates an entry; it appends a new entry with a
//! later timestamp. Rebuilds happen wholesale (see
//! [`Node::load_consensus_nodes`](crate::Node::load_consensus_nodes)).

use crate::config::{
    MINIMUM_NODES_COUNT, NODE_ACCEPT_PERIOD_MINIMUM, QUORUM_UNATTAINABLE,
    SNAPSHOT_REFERENCE_THRESHOLD, SNAPSHOT_ROUND_GAP,
};
use braid_types::{Address, Hash, NodeState};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// One historical state entry of one consensus node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CNode {
    pub id_for_network: Hash,
    pub signer: Address,
    pub payee: Address,
    /// Hash of the on-graph transaction that caused this state entry.
    pub transaction: Hash,
    /// Nanosecond timestamp; monotonic within one id's history.
    pub timestamp: u64,
    pub state: NodeState,
    /// Dense 0-based position among {Pledging, Accepted} entries in canonical
    /// order. Only meaningful on sequence outputs.
    pub consensus_index: usize,
}

impl CNode {
    fn counts_for_consensus(&self) -> bool {
        matches!(self.state, NodeState::Accepted | NodeState::Pledging)
    }
}

/// The canonical registry order: timestamp ascending, ties broken by the
/// hex form of the id (identical to byte order, see [`Hash`]).
fn canonical_order(a: &CNode, b: &CNode) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.id_for_network.cmp(&b.id_for_network))
}

/// The node set as of one registry event.
#[derive(Debug, Clone)]
pub struct NodeStateSequence {
    pub timestamp: u64,
    pub nodes_without_state: Vec<Arc<CNode>>,
}

/// Immutable snapshot of all node entries plus the derived sequence arrays
/// and the genesis membership set.
pub struct NodeRegistry {
    all_nodes_sorted: Vec<Arc<CNode>>,
    sequences: Vec<NodeStateSequence>,
    accepted_sequences: Vec<NodeStateSequence>,
    genesis_nodes: HashSet<Hash>,
}

impl NodeRegistry {
    /// Build the registry from raw entries. Sorting and sequence
    /// materialization happen here; afterwards the registry is read-only.
    pub fn new(mut nodes: Vec<CNode>, genesis_nodes: HashSet<Hash>) -> Self {
        nodes.sort_by(canonical_order);
        let all_nodes_sorted: Vec<Arc<CNode>> = nodes.into_iter().map(Arc::new).collect();
        let sequences = build_sequences(&all_nodes_sorted, false);
        let accepted_sequences = build_sequences(&all_nodes_sorted, true);
        Self {
            all_nodes_sorted,
            sequences,
            accepted_sequences,
            genesis_nodes,
        }
    }

    /// An empty registry with no genesis set.
    pub fn empty() -> Self {
        Self::new(Vec::new(), HashSet::new())
    }

    /// Every entry ever recorded, in canonical order.
    pub fn all_nodes(&self) -> &[Arc<CNode>] {
        &self.all_nodes_sorted
    }

    pub fn len(&self) -> usize {
        self.all_nodes_sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_nodes_sorted.is_empty()
    }

    /// Whether an id belongs to the genesis descriptor.
    pub fn is_genesis(&self, id: &Hash) -> bool {
        self.genesis_nodes.contains(id)
    }

    /// The node set just before `threshold`: the list of the greatest event
    /// with `timestamp < threshold`, or empty when no event precedes it.
    pub fn nodes_list_without_state(&self, threshold: u64, accepted_only: bool) -> &[Arc<CNode>] {
        let sequences = if accepted_only {
            &self.accepted_sequences
        } else {
            &self.sequences
        };
        let n = sequences.partition_point(|seq| seq.timestamp < threshold);
        if n == 0 {
            &[]
        } else {
            &sequences[n - 1].nodes_without_state
        }
    }

    /// The node currently pledging as of `timestamp`, if the latest entry is
    /// a pledge.
    pub fn pledging_node(&self, timestamp: u64) -> Option<Arc<CNode>> {
        let nodes = self.nodes_list_without_state(timestamp, false);
        let last = nodes.last()?;
        if last.state == NodeState::Pledging {
            Some(last.clone())
        } else {
            None
        }
    }

    /// The accepted or pledging entry for `id` as of `now_ns`.
    pub fn accepted_or_pledging_node(&self, id: &Hash, now_ns: u64) -> Option<Arc<CNode>> {
        self.nodes_list_without_state(now_ns, false)
            .iter()
            .find(|cn| {
                cn.id_for_network == *id
                    && matches!(cn.state, NodeState::Accepted | NodeState::Pledging)
            })
            .cloned()
    }

    /// The removed or cancelled entry for `id` as of `timestamp`.
    pub fn removed_or_cancelled_node(&self, id: &Hash, timestamp: u64) -> Option<Arc<CNode>> {
        self.nodes_list_without_state(timestamp, false)
            .iter()
            .find(|cn| {
                cn.id_for_network == *id
                    && matches!(cn.state, NodeState::Removed | NodeState::Cancelled)
            })
            .cloned()
    }

    /// Whether an accepted node may sign as of `timestamp`.
    ///
    /// Genesis nodes may sign immediately; everyone else serves the full
    /// accept period first.
    pub fn consensus_ready(&self, cn: &CNode, timestamp: u64) -> bool {
        if cn.state != NodeState::Accepted {
            return false;
        }
        if self.genesis_nodes.contains(&cn.id_for_network) {
            return true;
        }
        cn.timestamp + NODE_ACCEPT_PERIOD_MINIMUM < timestamp
    }

    /// The BFT supermajority over the qualified node base at `timestamp`.
    ///
    /// With `finalizing` set, pledging nodes are left out of the base so a
    /// stalled pledger cannot hold up round finalization. Returns
    /// [`QUORUM_UNATTAINABLE`] when fewer than [`MINIMUM_NODES_COUNT`] nodes
    /// qualify.
    pub fn consensus_threshold(&self, timestamp: u64, finalizing: bool) -> usize {
        let threshold_gap = SNAPSHOT_REFERENCE_THRESHOLD * SNAPSHOT_ROUND_GAP;
        let mut base = 0usize;
        for cn in self.nodes_list_without_state(timestamp, false) {
            match cn.state {
                NodeState::Pledging => {
                    // A pledge transaction may be broadcast very late; until
                    // the maturity window passes the pledger is invisible to
                    // the quorum.
                    let maturity = NODE_ACCEPT_PERIOD_MINIMUM - threshold_gap * 3;
                    if !finalizing && cn.timestamp + maturity < timestamp {
                        base += 1;
                    }
                }
                NodeState::Accepted => {
                    if self.genesis_nodes.contains(&cn.id_for_network)
                        || cn.timestamp + threshold_gap < timestamp
                    {
                        base += 1;
                    }
                }
                _ => {}
            }
        }
        if base < MINIMUM_NODES_COUNT {
            debug!(timestamp, base, minimum = MINIMUM_NODES_COUNT, "consensus base too small");
            return QUORUM_UNATTAINABLE;
        }
        base * 2 / 3 + 1
    }
}

fn build_sequences(all_sorted: &[Arc<CNode>], accepted_only: bool) -> Vec<NodeStateSequence> {
    all_sorted
        .iter()
        .map(|cn| NodeStateSequence {
            timestamp: cn.timestamp,
            nodes_without_state: sequence_without_state(all_sorted, cn.timestamp + 1, accepted_only),
        })
        .collect()
}

/// The surviving node set for one threshold: last writer wins per id over
/// entries with `timestamp < threshold`, optionally restricted to Accepted,
/// re-sorted canonically, consensus indexes assigned left to right.
fn sequence_without_state(
    all_sorted: &[Arc<CNode>],
    threshold: u64,
    accepted_only: bool,
) -> Vec<Arc<CNode>> {
    let mut latest: HashMap<Hash, &Arc<CNode>> = HashMap::new();
    for cn in all_sorted {
        if cn.timestamp >= threshold {
            break;
        }
        latest.insert(cn.id_for_network, cn);
    }

    let mut nodes: Vec<CNode> = latest
        .into_values()
        .filter(|cn| !accepted_only || cn.state == NodeState::Accepted)
        .map(|cn| (**cn).clone())
        .collect();
    nodes.sort_by(canonical_order);

    let mut index = 0usize;
    for cn in &mut nodes {
        cn.consensus_index = index;
        if cn.counts_for_consensus() {
            index += 1;
        }
    }
    nodes.into_iter().map(Arc::new).collect()
}
