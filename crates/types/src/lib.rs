//! Core types for the braid ledger.
//!
//! This crate provides the foundational types used throughout the node:
//!
//! - **Primitives**: [`Hash`], cryptographic keys and signatures
//! - **Identity**: [`Address`] and [`Signer`] (spend key plus derived view key)
//! - **Consensus records**: [`NodeState`], [`SyncPoint`], [`Transaction`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod address;
mod crypto;
mod hash;
mod state;
mod sync_point;
mod transaction;

pub use address::{Address, AddressError, Signer};
pub use crypto::{KeyPair, PublicKey, Signature, SIGNATURE_LENGTH};
pub use hash::{Hash, HexError};
pub use state::{NodeState, NodeStateParseError};
pub use sync_point::{PoolInfo, SyncPoint};
pub use transaction::Transaction;
