//! The `DataPlaneDriver` capability boundary (spec.md §4.6, §6).
//!
//! The driver itself — WireGuard/BIRD/VPP — is explicitly out of scope
//! (spec.md §1). This module only defines the trait surface the Data-Plane
//! Bridge invokes, so a test double or a real driver can be plugged in
//! without the bridge knowing the difference.

use crate::metrics::MetricsSample;
use crate::node::NodeId;
use async_trait::async_trait;
use std::fmt;

/// Error returned by a `DataPlaneDriver` call.
#[derive(Debug, Clone)]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data-plane driver error: {}", self.message)
    }
}

impl std::error::Error for DriverError {}

/// Snapshot of the driver's own state, returned by `status()`.
#[derive(Debug, Clone, Default)]
pub struct DriverStatus {
    pub bgp_peers: usize,
    pub tunnels: usize,
    pub forwarding: bool,
}

/// External capability the Data-Plane Bridge (C6) commands. Fully
/// external: DDARP never implements a driver, only this boundary
/// (spec.md §4.6).
#[async_trait]
pub trait DataPlaneDriver: Send + Sync {
    async fn add_peer(
        &self,
        peer_id: &NodeId,
        endpoint: std::net::SocketAddr,
        asn: Option<u32>,
    ) -> Result<(), DriverError>;

    async fn remove_peer(&self, peer_id: &NodeId) -> Result<(), DriverError>;

    async fn apply_route(
        &self,
        destination: &NodeId,
        path: &[NodeId],
        metrics: &MetricsSample,
    ) -> Result<(), DriverError>;

    async fn status(&self) -> DriverStatus;

    async fn is_healthy(&self) -> bool;
}
