//! Consensus node lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a consensus node registry entry.
///
/// A node's history is a sequence of immutable entries; a state change is a
/// new entry with a later timestamp, never a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    /// Pledge transaction observed, acceptance pending.
    Pledging,
    /// Full consensus participant.
    Accepted,
    /// Removed by the network.
    Removed,
    /// Pledge cancelled before acceptance.
    Cancelled,
    /// Voluntarily leaving.
    Resigning,
}

/// Error parsing a [`NodeState`] from its canonical string form.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown node state {0:?}")]
pub struct NodeStateParseError(pub String);

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Pledging => "PLEDGING",
            NodeState::Accepted => "ACCEPTED",
            NodeState::Removed => "REMOVED",
            NodeState::Cancelled => "CANCELLED",
            NodeState::Resigning => "RESIGNING",
        };
        f.write_str(s)
    }
}

impl FromStr for NodeState {
    type Err = NodeStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLEDGING" => Ok(NodeState::Pledging),
            "ACCEPTED" => Ok(NodeState::Accepted),
            "REMOVED" => Ok(NodeState::Removed),
            "CANCELLED" => Ok(NodeState::Cancelled),
            "RESIGNING" => Ok(NodeState::Resigning),
            other => Err(NodeStateParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_round_trip() {
        for state in [
            NodeState::Pledging,
            NodeState::Accepted,
            NodeState::Removed,
            NodeState::Cancelled,
            NodeState::Resigning,
        ] {
            assert_eq!(state.to_string().parse::<NodeState>().unwrap(), state);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("SLEEPING".parse::<NodeState>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_strings() {
        let encoded = serde_json::to_string(&NodeState::Accepted).unwrap();
        assert_eq!(encoded, "\"ACCEPTED\"");
    }
}
