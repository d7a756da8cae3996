//! Routing table data model (spec.md §3, §4.4).

use crate::node::NodeId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default route freshness window (spec.md §6 `route_freshness_s`).
pub const DEFAULT_ROUTE_FRESHNESS: Duration = Duration::from_secs(120);

/// A computed path to a destination.
///
/// `path` starts with the local node; `next_hop` is `path[1]`. The
/// invariant that `next_hop` is a direct neighbor in the topology "at the
/// moment of computation" is the path engine's responsibility, not this
/// type's — `Route` itself is just the committed result.
#[derive(Debug, Clone)]
pub struct Route {
    pub destination: NodeId,
    pub path: Vec<NodeId>,
    pub cost: f64,
    pub last_updated: Instant,
}

impl Route {
    pub fn new(destination: NodeId, path: Vec<NodeId>, cost: f64) -> Self {
        Self {
            destination,
            path,
            cost,
            last_updated: Instant::now(),
        }
    }

    /// `path[1]`, the directly-reachable neighbor this route exits through.
    pub fn next_hop(&self) -> Option<&NodeId> {
        self.path.get(1)
    }

    /// A route is fresh while `now - last_updated < freshness`.
    pub fn is_fresh(&self, now: Instant, freshness: Duration) -> bool {
        now.saturating_duration_since(self.last_updated) < freshness
    }

    /// Age of this route relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_updated)
    }
}

/// Destination → `Route` map, mutated only by the path engine's commit
/// step (spec.md §4.4, §5).
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<NodeId, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, destination: &NodeId) -> Option<&Route> {
        self.routes.get(destination)
    }

    pub fn insert(&mut self, route: Route) {
        self.routes.insert(route.destination.clone(), route);
    }

    pub fn remove(&mut self, destination: &NodeId) -> Option<Route> {
        self.routes.remove(destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Route)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Return a fresh route to `destination`, or `None` if absent or stale
    /// (spec.md §4.4 "Route freshness").
    pub fn fresh_route(
        &self,
        destination: &NodeId,
        now: Instant,
        freshness: Duration,
    ) -> Option<&Route> {
        self.routes
            .get(destination)
            .filter(|route| route.is_fresh(now, freshness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_route_is_not_fresh() {
        let dest = NodeId::new("dest").unwrap();
        let hop = NodeId::new("hop").unwrap();
        let self_id = NodeId::new("self").unwrap();
        let mut route = Route::new(dest.clone(), vec![self_id, hop], 10.0);
        route.last_updated = Instant::now() - Duration::from_secs(200);

        let mut table = RoutingTable::new();
        table.insert(route);

        assert!(table
            .fresh_route(&dest, Instant::now(), DEFAULT_ROUTE_FRESHNESS)
            .is_none());
    }

    #[test]
    fn next_hop_is_second_path_element() {
        let self_id = NodeId::new("self").unwrap();
        let hop = NodeId::new("hop").unwrap();
        let dest = NodeId::new("dest").unwrap();
        let route = Route::new(dest, vec![self_id, hop.clone()], 5.0);
        assert_eq!(route.next_hop(), Some(&hop));
    }
}
