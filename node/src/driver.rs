//! Stand-in [`DataPlaneDriver`] used until a real driver (WireGuard, BIRD,
//! VPP) is wired in — that integration is explicitly out of scope (spec.md
//! §1, §4.6). This implementation only logs what it would have done, so
//! the composite node can run end-to-end without one.

use async_trait::async_trait;
use tracing::info;
use types::dataplane::{DataPlaneDriver, DriverError, DriverStatus};
use types::metrics::MetricsSample;
use types::node::NodeId;

#[derive(Debug, Default)]
pub struct NoopDriver;

#[async_trait]
impl DataPlaneDriver for NoopDriver {
    async fn add_peer(&self, peer_id: &NodeId, endpoint: std::net::SocketAddr, asn: Option<u32>) -> Result<(), DriverError> {
        info!(component = "dataplane", peer = %peer_id, %endpoint, ?asn, "add_peer (noop driver)");
        Ok(())
    }

    async fn remove_peer(&self, peer_id: &NodeId) -> Result<(), DriverError> {
        info!(component = "dataplane", peer = %peer_id, "remove_peer (noop driver)");
        Ok(())
    }

    async fn apply_route(&self, destination: &NodeId, path: &[NodeId], metrics: &MetricsSample) -> Result<(), DriverError> {
        info!(component = "dataplane", %destination, hops = path.len(), latency_ms = ?metrics.latency_ms, "apply_route (noop driver)");
        Ok(())
    }

    async fn status(&self) -> DriverStatus {
        DriverStatus::default()
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
