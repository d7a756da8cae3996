//! Node identity and peer records (spec.md §3).

use crate::errors::{CommonError, Result};
use std::fmt;
use std::net::SocketAddr;

/// Maximum length, in bytes, of a [`NodeId`].
pub const NODE_ID_MAX_LEN: usize = 64;

/// Opaque short identifier for a DDARP node.
///
/// Identity is value-based and ordering is lexicographic, matching the
/// data model in spec.md §3. There is exactly one local `NodeId` per
/// process; that invariant is enforced by the composite node, not here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Build a `NodeId`, validating length and printability.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CommonError::InvalidNodeId {
                id,
                reason: "must not be empty",
            });
        }
        if id.len() > NODE_ID_MAX_LEN {
            return Err(CommonError::InvalidNodeId {
                id,
                reason: "exceeds 64 bytes",
            });
        }
        if !id.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            return Err(CommonError::InvalidNodeId {
                id,
                reason: "contains non-printable characters",
            });
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = CommonError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// A registered peer: identity plus the endpoint DDARP probes it on.
///
/// Created by management (`CompositeNode::add_peer`) and destroyed by
/// management or by the topology's staleness pass. Exclusively owned by
/// the composite node — the OWL engine and topology only ever see a
/// snapshot of the peer set, never a mutable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub node_id: NodeId,
    pub endpoint: SocketAddr,
}

impl Peer {
    pub fn new(node_id: NodeId, endpoint: SocketAddr) -> Self {
        Self { node_id, endpoint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_printable_ids() {
        assert!(NodeId::new("node-a").is_ok());
        assert!(NodeId::new("Node A 1").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_ids() {
        assert!(NodeId::new("").is_err());
        let too_long = "x".repeat(NODE_ID_MAX_LEN + 1);
        assert!(NodeId::new(too_long).is_err());
    }

    #[test]
    fn rejects_non_printable_ids() {
        assert!(NodeId::new("node\u{0007}").is_err());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = NodeId::new("a").unwrap();
        let b = NodeId::new("b").unwrap();
        assert!(a < b);
    }
}
