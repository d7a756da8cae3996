//! Data-plane bridge: translates routing decisions into calls on an
//! injected [`DataPlaneDriver`] (spec.md §4.6, component C6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;

use types::dataplane::DataPlaneDriver;
use types::metrics::MetricsSample;
use types::node::NodeId;
use types::route::RoutingTable;

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

struct RetryState {
    next_attempt: Instant,
    backoff: Duration,
}

/// Commands a [`DataPlaneDriver`] from routing decisions, retrying failed
/// applies with exponential backoff without blocking the Topology/Route
/// loop (spec.md §4.6 "Apply policy").
pub struct DataPlaneBridge {
    driver: Arc<dyn DataPlaneDriver>,
    retries: Mutex<HashMap<NodeId, RetryState>>,
    driver_failures: AtomicU64,
}

impl DataPlaneBridge {
    pub fn new(driver: Arc<dyn DataPlaneDriver>) -> Self {
        Self {
            driver,
            retries: Mutex::new(HashMap::new()),
            driver_failures: AtomicU64::new(0),
        }
    }

    pub fn driver_failures(&self) -> u64 {
        self.driver_failures.load(Ordering::SeqCst)
    }

    pub async fn add_peer(&self, peer_id: &NodeId, endpoint: std::net::SocketAddr, asn: Option<u32>) {
        if let Err(err) = self.driver.add_peer(peer_id, endpoint, asn).await {
            warn!(component = "dataplane", operation = "add_peer", peer = %peer_id, error = %err, "driver call failed");
        }
    }

    pub async fn remove_peer(&self, peer_id: &NodeId) {
        if let Err(err) = self.driver.remove_peer(peer_id).await {
            warn!(component = "dataplane", operation = "remove_peer", peer = %peer_id, error = %err, "driver call failed");
        }
        self.retries.lock().await.remove(peer_id);
    }

    /// One data-plane tick: apply routes for every non-direct destination
    /// that currently has a route, skipping destinations still in backoff
    /// (spec.md §4.6).
    pub async fn tick(&self, table: &RoutingTable, direct_peers: &[NodeId], metrics: impl Fn(&NodeId) -> MetricsSample) {
        let now = Instant::now();
        for (dest, route) in table.iter() {
            if direct_peers.contains(dest) {
                continue;
            }
            {
                let retries = self.retries.lock().await;
                if let Some(state) = retries.get(dest) {
                    if now < state.next_attempt {
                        continue;
                    }
                }
            }

            let sample = metrics(dest);
            match self
                .driver
                .apply_route(dest, &route.path, &sample)
                .await
            {
                Ok(()) => {
                    self.retries.lock().await.remove(dest);
                }
                Err(err) => {
                    self.driver_failures.fetch_add(1, Ordering::SeqCst);
                    warn!(component = "dataplane", operation = "apply_route", destination = %dest, error = %err, "driver call failed, will retry");
                    self.schedule_retry(dest.clone()).await;
                }
            }
        }
    }

    async fn schedule_retry(&self, dest: NodeId) {
        let mut retries = self.retries.lock().await;
        let state = retries.entry(dest).or_insert(RetryState {
            next_attempt: Instant::now(),
            backoff: BACKOFF_INITIAL,
        });
        state.next_attempt = Instant::now() + state.backoff;
        state.backoff = (state.backoff * 2).min(BACKOFF_MAX);
    }

    pub async fn is_healthy(&self) -> bool {
        self.driver.is_healthy().await
    }

    pub async fn status(&self) -> types::dataplane::DriverStatus {
        self.driver.status().await
    }
}
