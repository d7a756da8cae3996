//! Composite node: owns C1–C4 and C6, drives the tick loops, and exposes
//! the management-facing operations (spec.md §4.5, component C5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use ddarp_config::DaemonConfig;
use network::{DataPlaneBridge, OwlEngine, PathEngine, TopologyModel, UdpOwlSocket};
use types::dataplane::DataPlaneDriver;
use types::metrics::MetricMatrix;
use types::node::{NodeId, Peer};
use types::route::RoutingTable;
use types::topology::NodeType;

use crate::health::{ComponentHealth, HealthReport};

const TOPOLOGY_TICK: Duration = Duration::from_secs(5);
const DATAPLANE_TICK: Duration = Duration::from_secs(10);
const AGING_TICK: Duration = Duration::from_secs(5);
const HEALTH_TICK: Duration = Duration::from_secs(30);

fn config_node_type(config: &DaemonConfig) -> NodeType {
    match config.node_type {
        ddarp_config::NodeTypeConfig::Regular => NodeType::Regular,
        ddarp_config::NodeTypeConfig::Border => NodeType::Border,
    }
}

/// Owns the lifecycles of every collaborator and the tick loops that drive
/// them. Cloning shares the same underlying state (each field is itself
/// cheaply cloneable or wrapped in an `Arc`).
#[derive(Clone)]
pub struct CompositeNode {
    local: NodeId,
    config: Arc<DaemonConfig>,
    owl: OwlEngine,
    topology: Arc<TopologyModel>,
    path: Arc<PathEngine>,
    dataplane: Arc<DataPlaneBridge>,
    peers: Arc<tokio::sync::RwLock<std::collections::HashMap<NodeId, Peer>>>,
}

impl CompositeNode {
    pub async fn new(config: DaemonConfig, driver: Arc<dyn DataPlaneDriver>) -> anyhow::Result<Self> {
        let local = NodeId::new(config.node_id.clone())?;
        let bind_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.owl_port).parse()?;
        let socket = Arc::new(UdpOwlSocket::bind(bind_addr).await?);

        let owl = OwlEngine::new(
            local.clone(),
            config.shared_secret.clone().into_bytes(),
            socket,
            config.metric_window(),
        );
        let topology = Arc::new(TopologyModel::new(local.clone(), config_node_type(&config)));
        let path = Arc::new(PathEngine::new(local.clone()).with_hysteresis_threshold(config.hysteresis_threshold));
        let dataplane = Arc::new(DataPlaneBridge::new(driver));

        Ok(Self {
            local,
            config: Arc::new(config),
            owl,
            topology,
            path,
            dataplane,
            peers: Arc::new(tokio::sync::RwLock::new(std::collections::HashMap::new())),
        })
    }

    pub async fn add_peer(&self, node_id: NodeId, endpoint: std::net::SocketAddr, asn: Option<u32>) {
        let peer = Peer::new(node_id.clone(), endpoint);
        self.peers.write().await.insert(node_id.clone(), peer.clone());
        self.owl.add_peer(peer).await;
        self.topology.upsert_node(node_id.clone(), NodeType::Regular, Some(endpoint)).await;
        self.dataplane.add_peer(&node_id, endpoint, asn).await;
    }

    pub async fn remove_peer(&self, node_id: &NodeId) {
        self.peers.write().await.remove(node_id);
        self.owl.remove_peer(node_id).await;
        self.topology.remove_node(node_id).await;
        self.dataplane.remove_peer(node_id).await;
    }

    pub async fn metrics_snapshot(&self) -> MetricMatrix {
        self.owl.metrics_matrix().await
    }

    pub async fn routing_table_snapshot(&self) -> RoutingTable {
        self.path.routing_table_snapshot().await
    }

    pub async fn path_to(&self, dest: &NodeId) -> Option<Vec<NodeId>> {
        self.path.path(dest, self.config.route_freshness()).await
    }

    pub async fn health(&self) -> HealthReport {
        let mut report = HealthReport::new();
        let owl_counters = self.owl.counters();
        report.insert(
            "owl",
            ComponentHealth::ok()
                .with_counter("auth_failures", owl_counters.auth_failures)
                .with_counter("malformed_probes", owl_counters.malformed_probes),
        );
        report.insert("topology", ComponentHealth::ok().with_counter("edges", self.topology.edge_count().await as u64));
        report.insert("path", ComponentHealth::ok().with_counter("routes", self.path.routing_table_snapshot().await.len() as u64));
        let dataplane_healthy = self.dataplane.is_healthy().await;
        report.insert(
            "dataplane",
            ComponentHealth::ok()
                .with_counter("driver_failures", self.dataplane.driver_failures())
                .degraded_if(!dataplane_healthy),
        );
        report
    }

    /// Runs every tick loop until `cancel` signals shutdown, per the
    /// startup order in spec.md §4.5: Data-Plane Bridge and OWL Engine are
    /// already constructed by `new`, so only the composite loops remain to
    /// be started.
    pub async fn run(&self, cancel: watch::Receiver<bool>) {
        let probe_loop = {
            let owl = self.owl.clone();
            let interval = self.config.probe_interval();
            let cancel = cancel.clone();
            tokio::spawn(async move { owl.run_probe_loop(interval, cancel).await })
        };
        let recv_loop = {
            let owl = self.owl.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { owl.run_recv_loop(cancel).await })
        };
        let timeout_loop = {
            let node = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { node.run_timeout_loop(cancel).await })
        };
        let topology_loop = {
            let node = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { node.run_topology_loop(cancel).await })
        };
        let dataplane_loop = {
            let node = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { node.run_dataplane_loop(cancel).await })
        };
        let aging_loop = {
            let node = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { node.run_aging_loop(cancel).await })
        };
        let health_loop = {
            let node = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { node.run_health_loop(cancel).await })
        };

        let _ = tokio::join!(
            probe_loop,
            recv_loop,
            timeout_loop,
            topology_loop,
            dataplane_loop,
            aging_loop,
            health_loop,
        );
    }

    async fn run_timeout_loop(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.probe_timeout());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.owl.reap_timeouts(self.config.probe_timeout()).await;
                }
                _ = cancel.changed() => { if *cancel.borrow() { return; } }
            }
        }
    }

    async fn run_topology_loop(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(TOPOLOGY_TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let matrix = self.owl.metrics_matrix().await;
                    self.topology.update(&matrix).await;
                    self.path.recompute(&self.topology).await;
                }
                _ = cancel.changed() => { if *cancel.borrow() { return; } }
            }
        }
    }

    async fn run_dataplane_loop(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(DATAPLANE_TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let table = self.path.routing_table_snapshot().await;
                    let direct_peers: Vec<NodeId> = self.peers.read().await.keys().cloned().collect();
                    let matrix = self.owl.metrics_matrix().await;
                    self.dataplane
                        .tick(&table, &direct_peers, |dest| matrix.get(dest).copied().unwrap_or_default())
                        .await;
                }
                _ = cancel.changed() => { if *cancel.borrow() { return; } }
            }
        }
    }

    /// Removes peers last seen > 120 s ago (spec.md §4.5 "Aging loop").
    /// `TopologyModel::update` already drops nodes past that age (spec.md
    /// §4.3); this loop reconciles the peer registry against that result
    /// rather than tracking a second last-seen clock.
    async fn run_aging_loop(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(AGING_TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let to_remove: Vec<NodeId> = {
                        let peers = self.peers.read().await;
                        let mut result = Vec::new();
                        for id in peers.keys() {
                            if !self.topology.has_node(id).await {
                                result.push(id.clone());
                            }
                        }
                        result
                    };
                    for id in to_remove {
                        warn!(component = "node", peer = %id, "peer aged out of topology, dropping registration");
                        self.remove_peer(&id).await;
                    }
                }
                _ = cancel.changed() => { if *cancel.borrow() { return; } }
            }
        }
    }

    async fn run_health_loop(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(HEALTH_TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.health().await;
                    info!(component = "node", healthy = report.is_healthy(), "health snapshot");
                }
                _ = cancel.changed() => { if *cancel.borrow() { return; } }
            }
        }
    }

    /// Graceful shutdown in reverse startup order (spec.md §4.5, §5).
    pub async fn shutdown(&self) {
        self.owl.shutdown(self.config.probe_interval(), Duration::from_secs(15)).await;
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local
    }
}
