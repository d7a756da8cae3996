//! Topology data model (spec.md §3, §4.3).

use crate::node::NodeId;
use std::net::SocketAddr;
use std::time::Instant;

/// A node's role in the topology.
///
/// `Border` is carried as an attribute only — it authorizes a node to
/// originate routes toward non-DDARP destinations in the full system,
/// but that behavior is delegated (spec.md §1, §9) and nothing in this
/// workspace branches on it beyond storing and reporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NodeType {
    Regular,
    Border,
}

/// A node as seen by the topology: identity, role, endpoint, and the last
/// time it was observed (spec.md §3).
#[derive(Debug, Clone)]
pub struct TopologyNode {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub endpoint: Option<SocketAddr>,
    pub last_seen: Instant,
}

impl TopologyNode {
    pub fn new(node_id: NodeId, node_type: NodeType, endpoint: Option<SocketAddr>) -> Self {
        Self {
            node_id,
            node_type,
            endpoint,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

/// An undirected edge keyed by the unordered pair `{u, v}`.
///
/// Invariants (spec.md §4.3): no self-loops, at most one edge per pair,
/// `weight > 0`. `weight = latency_ms + 10 * packet_loss_percent`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub weight: f64,
    pub last_observed: Instant,
}

impl Edge {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            last_observed: Instant::now(),
        }
    }
}

/// Canonical unordered key for an edge between two nodes.
///
/// Sorting the pair makes `{u, v}` and `{v, u}` hash and compare equal,
/// which is what "undirected, at most one edge per pair" requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey(NodeId, NodeId);

impl EdgeKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.0, &self.1)
    }

    pub fn other(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.0 == node {
            Some(&self.1)
        } else if &self.1 == node {
            Some(&self.0)
        } else {
            None
        }
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        &self.0 == node || &self.1 == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_is_order_independent() {
        let a = NodeId::new("a").unwrap();
        let b = NodeId::new("b").unwrap();
        assert_eq!(EdgeKey::new(a.clone(), b.clone()), EdgeKey::new(b, a));
    }

    #[test]
    fn edge_key_rejects_neither_endpoint() {
        let a = NodeId::new("a").unwrap();
        let b = NodeId::new("b").unwrap();
        let c = NodeId::new("c").unwrap();
        let key = EdgeKey::new(a, b);
        assert!(key.other(&c).is_none());
    }
}
