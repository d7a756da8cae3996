//! Path engine: Dijkstra over the topology plus hysteresis-damped route
//! replacement (spec.md §4.4, component C4).

use std::collections::{BinaryHeap, HashMap};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use types::node::NodeId;
use types::route::{Route, RoutingTable};

use crate::topology::TopologyModel;

const ROUTE_MAX_AGE: Duration = Duration::from_secs(30);
const HYSTERESIS_THRESHOLD: f64 = 0.20;

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: NodeId,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for a min-heap; break ties on NodeId so results are
        // deterministic (spec.md §4.4 "ties broken by destination NodeId
        // lexicographic order").
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Computes shortest paths from a fixed source node and maintains a
/// hysteresis-damped [`RoutingTable`].
///
/// Single writer (the Topology/Route loop); many snapshot readers.
pub struct PathEngine {
    local: NodeId,
    hysteresis_threshold: f64,
    table: RwLock<RoutingTable>,
}

impl PathEngine {
    pub fn new(local: NodeId) -> Self {
        Self {
            local,
            hysteresis_threshold: HYSTERESIS_THRESHOLD,
            table: RwLock::new(RoutingTable::new()),
        }
    }

    pub fn with_hysteresis_threshold(mut self, threshold: f64) -> Self {
        self.hysteresis_threshold = threshold;
        self
    }

    /// Runs Dijkstra from `self.local` over `topology` and applies the
    /// hysteresis policy to decide which destinations get a new route
    /// (spec.md §4.4).
    pub async fn recompute(&self, topology: &TopologyModel) {
        if !topology.has_node(&self.local).await {
            *self.table.write().await = RoutingTable::new();
            return;
        }

        let paths = self.dijkstra(topology).await;
        let now = Instant::now();
        let mut table = self.table.write().await;

        for (dest, (cost, path)) in paths {
            let candidate = Route::new(dest.clone(), path, cost);
            let should_replace = match table.get(&dest) {
                None => true,
                Some(current) => {
                    if current.age(now) > ROUTE_MAX_AGE {
                        true
                    } else if !self.next_hop_is_neighbor(current, topology).await {
                        true
                    } else {
                        let improvement = (current.cost - cost) / current.cost;
                        improvement >= self.hysteresis_threshold
                    }
                }
            };
            if should_replace {
                table.insert(candidate);
            }
        }

        // Unreachable destinations retain their stale entry until it ages
        // out naturally (spec.md §4.4 "do not advertise a hole that was
        // momentary").
    }

    async fn next_hop_is_neighbor(&self, route: &Route, topology: &TopologyModel) -> bool {
        match route.next_hop() {
            Some(next_hop) => topology.is_neighbor(&self.local, next_hop).await,
            None => true,
        }
    }

    async fn dijkstra(&self, topology: &TopologyModel) -> HashMap<NodeId, (f64, Vec<NodeId>)> {
        let mut distances: HashMap<NodeId, f64> = HashMap::new();
        let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
        let mut visited: HashMap<NodeId, bool> = HashMap::new();
        let mut heap = BinaryHeap::new();

        distances.insert(self.local.clone(), 0.0);
        heap.push(HeapEntry {
            cost: 0.0,
            node: self.local.clone(),
        });

        while let Some(HeapEntry { cost, node }) = heap.pop() {
            if visited.get(&node).copied().unwrap_or(false) {
                continue;
            }
            visited.insert(node.clone(), true);

            for (neighbor, weight) in topology.neighbors(&node).await {
                let candidate_cost = cost + weight;
                let better = distances
                    .get(&neighbor)
                    .map(|&known| candidate_cost < known)
                    .unwrap_or(true);
                if better {
                    distances.insert(neighbor.clone(), candidate_cost);
                    previous.insert(neighbor.clone(), node.clone());
                    heap.push(HeapEntry {
                        cost: candidate_cost,
                        node: neighbor,
                    });
                }
            }
        }

        let mut paths = HashMap::new();
        for (dest, cost) in distances {
            if dest == self.local {
                continue;
            }
            let mut path = vec![dest.clone()];
            let mut cursor = dest.clone();
            while let Some(prev) = previous.get(&cursor) {
                path.push(prev.clone());
                cursor = prev.clone();
            }
            path.reverse();
            paths.insert(dest, (cost, path));
        }
        paths
    }

    /// Returns the next hop toward `dest`, honoring route freshness
    /// (spec.md §4.4 "Route freshness").
    pub async fn next_hop(&self, dest: &NodeId, freshness: Duration) -> Option<NodeId> {
        let table = self.table.read().await;
        let route = table.fresh_route(dest, Instant::now(), freshness)?;
        route.next_hop().cloned()
    }

    pub async fn path(&self, dest: &NodeId, freshness: Duration) -> Option<Vec<NodeId>> {
        let table = self.table.read().await;
        let route = table.fresh_route(dest, Instant::now(), freshness)?;
        Some(route.path.clone())
    }

    pub async fn routing_table_snapshot(&self) -> RoutingTable {
        self.table.read().await.clone()
    }
}
