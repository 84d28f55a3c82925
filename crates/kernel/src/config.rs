//! Kernel configuration: consensus constants and node options.

use braid_types::KeyPair;

/// Nanoseconds in one second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Target spacing between rounds on one chain, in nanoseconds.
pub const SNAPSHOT_ROUND_GAP: u64 = 3 * NANOS_PER_SEC;

/// How many round gaps a reference may lag before it is considered stale.
pub const SNAPSHOT_REFERENCE_THRESHOLD: u64 = 10;

/// How long an accepted node must wait before it may participate in
/// consensus, in nanoseconds. Genesis nodes are exempt.
pub const NODE_ACCEPT_PERIOD_MINIMUM: u64 = 12 * 60 * 60 * NANOS_PER_SEC;

/// Minimum number of qualified nodes for a valid consensus base.
pub const MINIMUM_NODES_COUNT: usize = 7;

/// Sentinel quorum returned when fewer than [`MINIMUM_NODES_COUNT`] nodes
/// qualify. No realistic peer count reaches it, so callers comparing
/// `count >= threshold` refuse to act.
pub const QUORUM_UNATTAINABLE: usize = 1000;

// Misconfigured constants are a build defect, not a runtime condition.
const _: () = assert!(
    SNAPSHOT_REFERENCE_THRESHOLD * SNAPSHOT_ROUND_GAP <= 3 * 60 * NANOS_PER_SEC,
    "reference threshold times round gap must stay within three minutes"
);
const _: () = assert!(
    NODE_ACCEPT_PERIOD_MINIMUM >= 60 * 60 * NANOS_PER_SEC,
    "node accept period must be at least one hour"
);

/// Node options recognized by the kernel.
///
/// Parsing a configuration file into this struct is the embedder's job; the
/// kernel only defines the contract.
#[derive(Clone)]
pub struct KernelConfig {
    /// Private spend key; the full signer identity is derived from it.
    pub signer: KeyPair,
    /// Whether this node relays traffic for consumer peers.
    pub relayer: bool,
    /// Relayer seeds, each `"{hex_id}@{addr}"`.
    pub seeds: Vec<String>,
    /// Address the current-generation transport listens on.
    pub listen_addr: String,
    /// Legacy transport listener address; empty disables legacy listening.
    pub legacy_listener: String,
    /// Legacy neighbor addresses to ping at startup.
    pub legacy_peers: Vec<String>,
}

impl KernelConfig {
    /// Minimal configuration for a node that neither relays nor speaks the
    /// legacy transport.
    pub fn new(signer: KeyPair, listen_addr: impl Into<String>) -> Self {
        Self {
            signer,
            relayer: false,
            seeds: Vec::new(),
            listen_addr: listen_addr.into(),
            legacy_listener: String::new(),
            legacy_peers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_gap_within_bounds() {
        assert!(SNAPSHOT_REFERENCE_THRESHOLD * SNAPSHOT_ROUND_GAP <= 180 * NANOS_PER_SEC);
    }

    #[test]
    fn test_accept_period_dominates_threshold_gap() {
        // The pledging maturity window subtracts three threshold gaps from
        // the accept period; the subtraction must never underflow.
        assert!(NODE_ACCEPT_PERIOD_MINIMUM > 3 * SNAPSHOT_REFERENCE_THRESHOLD * SNAPSHOT_ROUND_GAP);
    }
}
