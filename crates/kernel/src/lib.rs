//! Kernel of a braid node.
//!
//! The braid ledger is a permissioned, hash-linked graph of rounds produced
//! by a dynamic set of accepted consensus nodes. This crate is the node's
//! core: everything that decides *who* participates in consensus at a given
//! timestamp, *how many* of them constitute a quorum, whether the local
//! graph is caught up with the network, and whether a peer is allowed
//! through the handshake.
//!
//! # Architecture
//!
//! - [`registry`]: the immutable consensus node registry, its
//!   timestamp-indexed sequence views, and the threshold rules.
//! - [`auth`]: signed, time-bounded handshake tokens for both transport
//!   generations.
//! - [`sync`]: per-generation sync-point trackers and the catch-up /
//!   broadcast detectors.
//! - [`node`]: boot glue wiring the pieces to their backing stores, plus
//!   the graph pusher background task.
//!
//! The persistent store, cache store, transports and clock are external
//! collaborators consumed through the narrow traits in [`store`],
//! [`transport`] and [`clock`]. The kernel owns no persistence of its own.
//!
//! # Concurrency
//!
//! Every exported operation is safe under concurrent invocation. Shared
//! state is either immutable-after-boot (the registry, swapped wholesale on
//! reload) or published as immutable snapshots behind `Arc` handles (sync
//! points). Background tasks observe one node-wide cancellation token.

pub mod auth;
pub mod chain;
pub mod clock;
pub mod config;
mod error;
pub mod genesis;
mod node;
mod pusher;
pub mod registry;
pub mod store;
pub mod sync;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use auth::{AuthError, AuthToken, HANDSHAKE_LEN};
pub use chain::{CacheRound, Chain, ChainState, ChainsMap, FinalRound, SnapshotRef};
pub use clock::{Clock, SystemClock};
pub use config::{
    KernelConfig, MINIMUM_NODES_COUNT, NODE_ACCEPT_PERIOD_MINIMUM, QUORUM_UNATTAINABLE,
    SNAPSHOT_REFERENCE_THRESHOLD, SNAPSHOT_ROUND_GAP,
};
pub use error::KernelError;
pub use genesis::{Genesis, GenesisNode};
pub use node::{Node, TopologyCounter};
pub use registry::{CNode, NodeRegistry, NodeStateSequence};
pub use store::{CacheStore, ChainHead, NodeRecord, SnapshotEntry, Store, StoreError};
pub use sync::{check_broadcasted, check_catch_up, SyncPointTracker, SyncPointsMap};
pub use transport::{LegacyTransport, Transport, TransportError};
