//! Topology model: the undirected weighted graph derived from the OWL
//! metric matrix, with aging (spec.md §4.3, component C3).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use types::metrics::MetricMatrix;
use types::node::NodeId;
use types::topology::{Edge, EdgeKey, NodeType, TopologyNode};

const STALE_OBSERVATION: Duration = Duration::from_secs(30);
const HIGH_LOSS_THRESHOLD: f64 = 50.0;
const WEIGHT_CHURN_EPSILON: f64 = 0.1;
const EDGE_AGE_LIMIT: Duration = Duration::from_secs(60);
const NODE_AGE_LIMIT: Duration = Duration::from_secs(120);

struct Inner {
    nodes: HashMap<NodeId, TopologyNode>,
    edges: HashMap<EdgeKey, Edge>,
}

/// The local node's view of the network graph.
///
/// Single writer: the Topology/Route loop, invoked once per tick from the
/// composite node. Readers take an immutable snapshot.
pub struct TopologyModel {
    local: NodeId,
    inner: RwLock<Inner>,
}

impl TopologyModel {
    pub fn new(local: NodeId, local_type: NodeType) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(local.clone(), TopologyNode::new(local.clone(), local_type, None));
        Self {
            local,
            inner: RwLock::new(Inner {
                nodes,
                edges: HashMap::new(),
            }),
        }
    }

    /// Registers or refreshes a node's presence (spec.md §4.3 "Node set
    /// is a superset of edge endpoints").
    pub async fn upsert_node(&self, node_id: NodeId, node_type: NodeType, endpoint: Option<std::net::SocketAddr>) {
        let mut inner = self.inner.write().await;
        match inner.nodes.get_mut(&node_id) {
            Some(existing) => {
                existing.touch();
                if endpoint.is_some() {
                    existing.endpoint = endpoint;
                }
            }
            None => {
                inner.nodes.insert(node_id.clone(), TopologyNode::new(node_id, node_type, endpoint));
            }
        }
    }

    pub async fn remove_node(&self, node_id: &NodeId) {
        let mut inner = self.inner.write().await;
        inner.nodes.remove(node_id);
        inner.edges.retain(|key, _| !key.contains(node_id));
    }

    /// Applies the per-tick update rule against the current metric matrix
    /// (spec.md §4.3 "Update rule").
    pub async fn update(&self, matrix: &MetricMatrix) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        for (dest, sample) in matrix.row.iter() {
            let Some(latency_ms) = sample.latency_ms else { continue };
            let src = matrix.local.clone();

            if !inner.nodes.contains_key(&src) || !inner.nodes.contains_key(dest) {
                continue;
            }

            let key = EdgeKey::new(src.clone(), dest.clone());

            let Some(last_updated) = sample.last_updated else { continue };
            if now.duration_since(last_updated) > STALE_OBSERVATION {
                inner.edges.remove(&key);
                continue;
            }
            if sample.packet_loss_percent > HIGH_LOSS_THRESHOLD {
                inner.edges.remove(&key);
                continue;
            }

            let weight = latency_ms + 10.0 * sample.packet_loss_percent;
            let churn = match inner.edges.get(&key) {
                Some(existing) => (existing.weight - weight).abs() <= WEIGHT_CHURN_EPSILON,
                None => false,
            };
            if !churn {
                inner.edges.insert(key, Edge::new(weight));
            }

            if let Some(node) = inner.nodes.get_mut(&src) {
                node.touch();
            }
            if let Some(node) = inner.nodes.get_mut(dest) {
                node.touch();
            }
        }

        self.age_edges(&mut inner, now);
        self.age_nodes(&mut inner, now);
    }

    fn age_edges(&self, inner: &mut Inner, now: Instant) {
        let local = self.local.clone();
        let last_seen: HashMap<NodeId, Instant> = inner
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.last_seen))
            .collect();
        inner.edges.retain(|key, _| {
            let (a, b) = key.endpoints();
            let other = if a == &local { b } else { a };
            match last_seen.get(other) {
                Some(seen) => now.duration_since(*seen) <= EDGE_AGE_LIMIT,
                None => false,
            }
        });
    }

    fn age_nodes(&self, inner: &mut Inner, now: Instant) {
        let local = self.local.clone();
        let stale: Vec<NodeId> = inner
            .nodes
            .iter()
            .filter(|(id, node)| **id != local && now.duration_since(node.last_seen) > NODE_AGE_LIMIT)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            inner.nodes.remove(id);
            debug!(component = "topology", node = %id, "aged out stale node");
        }
        inner.edges.retain(|key, _| !stale.iter().any(|id| key.contains(id)));
    }

    /// Snapshot of neighbor edges for Dijkstra (spec.md §4.4).
    pub async fn neighbors(&self, node: &NodeId) -> Vec<(NodeId, f64)> {
        let inner = self.inner.read().await;
        inner
            .edges
            .iter()
            .filter_map(|(key, edge)| key.other(node).map(|other| (other.clone(), edge.weight)))
            .collect()
    }

    pub async fn has_node(&self, node: &NodeId) -> bool {
        self.inner.read().await.nodes.contains_key(node)
    }

    pub async fn is_neighbor(&self, a: &NodeId, b: &NodeId) -> bool {
        self.inner.read().await.edges.contains_key(&EdgeKey::new(a.clone(), b.clone()))
    }

    pub async fn node_ids(&self) -> Vec<NodeId> {
        self.inner.read().await.nodes.keys().cloned().collect()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::metrics::MetricsSample;

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn sample(latency: f64, loss: f64, age: Duration) -> MetricsSample {
        MetricsSample {
            latency_ms: Some(latency),
            jitter_ms: 0.0,
            packet_loss_percent: loss,
            last_updated: Some(Instant::now() - age),
        }
    }

    #[tokio::test]
    async fn update_adds_edge_for_fresh_low_loss_sample() {
        let model = TopologyModel::new(node("a"), NodeType::Regular);
        model.upsert_node(node("b"), NodeType::Regular, None).await;

        let mut matrix = MetricMatrix::new(node("a"));
        matrix.set(node("b"), sample(10.0, 0.0, Duration::from_secs(0)));

        model.update(&matrix).await;
        assert!(model.is_neighbor(&node("a"), &node("b")).await);
    }

    #[tokio::test]
    async fn update_drops_edge_for_high_loss() {
        let model = TopologyModel::new(node("a"), NodeType::Regular);
        model.upsert_node(node("b"), NodeType::Regular, None).await;

        let mut matrix = MetricMatrix::new(node("a"));
        matrix.set(node("b"), sample(10.0, 0.0, Duration::from_secs(0)));
        model.update(&matrix).await;
        assert!(model.is_neighbor(&node("a"), &node("b")).await);

        let mut matrix2 = MetricMatrix::new(node("a"));
        matrix2.set(node("b"), sample(10.0, 75.0, Duration::from_secs(0)));
        model.update(&matrix2).await;
        assert!(!model.is_neighbor(&node("a"), &node("b")).await);
    }

    #[tokio::test]
    async fn update_ignores_stale_observation() {
        let model = TopologyModel::new(node("a"), NodeType::Regular);
        model.upsert_node(node("b"), NodeType::Regular, None).await;

        let mut matrix = MetricMatrix::new(node("a"));
        matrix.set(node("b"), sample(10.0, 0.0, Duration::from_secs(31)));
        model.update(&matrix).await;
        assert!(!model.is_neighbor(&node("a"), &node("b")).await);
    }

    #[tokio::test]
    async fn small_weight_delta_does_not_replace_edge() {
        let model = TopologyModel::new(node("a"), NodeType::Regular);
        model.upsert_node(node("b"), NodeType::Regular, None).await;

        let mut matrix = MetricMatrix::new(node("a"));
        matrix.set(node("b"), sample(10.0, 0.0, Duration::from_secs(0)));
        model.update(&matrix).await;
        let weight_before = model.neighbors(&node("a")).await[0].1;

        let mut matrix2 = MetricMatrix::new(node("a"));
        matrix2.set(node("b"), sample(10.05, 0.0, Duration::from_secs(0)));
        model.update(&matrix2).await;
        let weight_after = model.neighbors(&node("a")).await[0].1;

        assert_eq!(weight_before, weight_after);
    }
}
