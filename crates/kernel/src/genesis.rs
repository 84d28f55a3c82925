//! Genesis descriptor loading.

use crate::error::KernelError;
use braid_types::{Address, Hash};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One node listed in the initial network descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisNode {
    pub signer: Address,
    pub payee: Address,
    pub balance: u64,
}

/// The initial network descriptor, read from `{dir}/genesis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    /// Network start time in unix seconds.
    pub epoch: u64,
    pub nodes: Vec<GenesisNode>,
}

impl Genesis {
    pub const FILE_NAME: &'static str = "genesis.json";

    /// Read and parse the descriptor from a configuration directory.
    pub fn read(dir: &Path) -> Result<Self, KernelError> {
        let path = dir.join(Self::FILE_NAME);
        let raw = fs::read(&path)
            .map_err(|err| KernelError::GenesisLoad(format!("{}: {err}", path.display())))?;
        Self::from_slice(&raw)
    }

    /// Parse the descriptor from raw bytes.
    pub fn from_slice(raw: &[u8]) -> Result<Self, KernelError> {
        serde_json::from_slice(raw).map_err(|err| KernelError::GenesisLoad(err.to_string()))
    }

    /// The network id: blake3 over the canonical encoding of the descriptor.
    ///
    /// Re-encoding rather than hashing the input bytes makes the id
    /// independent of whitespace and field ordering in the file.
    pub fn network_id(&self) -> Hash {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        Hash::new(&encoded)
    }

    /// Ids of the genesis nodes on the given network, in descriptor order.
    pub fn node_ids(&self, network: Hash) -> Vec<Hash> {
        self.nodes
            .iter()
            .map(|n| n.signer.id_for_network(network))
            .collect()
    }
}
