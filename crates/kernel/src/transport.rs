//! Contracts for the two transport generations, consumed by the kernel.

use async_trait::async_trait;
use braid_types::{Hash, Transaction};
use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport send to {peer}: {reason}")]
    Send { peer: Hash, reason: String },

    #[error("transport listen: {0}")]
    Listen(String),

    #[error("transport connect {addr}: {reason}")]
    Connect { addr: String, reason: String },
}

/// The current-generation p2p transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send our sync graph to a peer.
    async fn send_graph_message(&self, peer_id: Hash) -> Result<(), TransportError>;

    /// Send a transaction to a peer.
    async fn send_transaction_message(
        &self,
        peer_id: Hash,
        tx: &Transaction,
    ) -> Result<(), TransportError>;

    /// Dial a relayer by id and address.
    async fn connect_relayer(&self, peer_id: Hash, addr: &str) -> Result<(), TransportError>;

    /// Accept consumer connections. Only relayers listen.
    async fn listen_consumers(&self) -> Result<(), TransportError>;
}

/// The legacy transport kept alive during migration.
#[async_trait]
pub trait LegacyTransport: Send + Sync {
    /// Ping a neighbor address.
    async fn ping_neighbor(&self, addr: &str) -> Result<(), TransportError>;

    /// Accept neighbor connections.
    async fn listen_neighbors(&self) -> Result<(), TransportError>;
}
