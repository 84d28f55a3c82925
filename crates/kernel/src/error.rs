//! Kernel error taxonomy.

use crate::auth::AuthError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the kernel.
///
/// Boot-time variants are fatal: the node refuses to start. Authentication
/// errors are handed back to the transport, which closes the connection.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Invalid node configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The genesis descriptor could not be read or parsed.
    #[error("genesis load: {0}")]
    GenesisLoad(String),

    /// A store operation failed.
    #[error(transparent)]
    StoreIO(#[from] StoreError),

    /// Boot-time graph validation found invalid entries.
    #[error("graph validation found {invalid} invalid entries out of {total}")]
    GraphInvalid { total: u64, invalid: u64 },

    /// A peer failed handshake authentication.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An invariant the kernel relies on was violated.
    #[error("internal: {0}")]
    Internal(String),
}
