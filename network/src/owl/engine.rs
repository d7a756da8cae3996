//! The OWL engine itself: probe emission, reply matching, and metric
//! recomputation (spec.md §4.2, component C2).

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, warn};

use types::metrics::{MetricsSample, MetricMatrix, PingRecord, HISTORY_DEPTH};
use types::node::{NodeId, Peer};

use crate::error::{NetworkError, Result};
use crate::owl::envelope::{sign, verify, ProbePayload, SignedEnvelope};

/// A peer's state in the probing lifecycle (spec.md §4.2 peer states).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerProbeState {
    Registered,
    Probing,
    Responsive,
    Silent,
}

/// Abstraction over the datagram socket so the engine can be driven by
/// tests without binding a real port. Mirrors the trait seam the teacher
/// puts around its transports (`network::transport::Transport`-style
/// split), narrowed to the two operations OWL actually needs.
#[async_trait]
pub trait OwlSocket: Send + Sync {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> std::io::Result<()>;
    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;
}

pub struct UdpOwlSocket {
    inner: UdpSocket,
}

impl UdpOwlSocket {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        Ok(Self {
            inner: UdpSocket::bind(addr).await?,
        })
    }
}

#[async_trait]
impl OwlSocket for UdpOwlSocket {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> std::io::Result<()> {
        self.inner.send_to(bytes, addr).await.map(|_| ())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

struct PendingPing {
    sent_at: Instant,
}

struct Shared {
    local: NodeId,
    secret: Vec<u8>,
    socket: Arc<dyn OwlSocket>,
    metric_window: Duration,
    peers: RwLock<HashMap<NodeId, Peer>>,
    states: RwLock<HashMap<NodeId, PeerProbeState>>,
    history: RwLock<HashMap<NodeId, VecDeque<PingRecord>>>,
    pending: Mutex<HashMap<(NodeId, u32), PendingPing>>,
    next_seq: Mutex<HashMap<NodeId, u32>>,
    metrics: RwLock<MetricMatrix>,
    shutting_down: AtomicBool,
    auth_failures: std::sync::atomic::AtomicU64,
    malformed_probes: std::sync::atomic::AtomicU64,
}

/// Cumulative error counters, exposed to the health report (spec.md §7
/// "Metrics counters expose per-error-kind totals").
#[derive(Debug, Clone, Copy, Default)]
pub struct OwlCounters {
    pub auth_failures: u64,
    pub malformed_probes: u64,
}

/// Drives OWL probing for one local node against its registered peers.
///
/// Cloning an `OwlEngine` clones the `Arc` handle; all clones share the
/// same peer set, history, and metric matrix (spec.md §5 single-writer
/// invariant for the metric matrix — the only writer is
/// [`OwlEngine::handle_inbound`] and [`OwlEngine::prune_silent_peers`]).
#[derive(Clone)]
pub struct OwlEngine {
    shared: Arc<Shared>,
}

impl OwlEngine {
    pub fn new(local: NodeId, secret: impl Into<Vec<u8>>, socket: Arc<dyn OwlSocket>, metric_window: Duration) -> Self {
        let metrics = MetricMatrix::new(local.clone());
        Self {
            shared: Arc::new(Shared {
                local,
                secret: secret.into(),
                socket,
                metric_window,
                peers: RwLock::new(HashMap::new()),
                states: RwLock::new(HashMap::new()),
                history: RwLock::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                next_seq: Mutex::new(HashMap::new()),
                metrics: RwLock::new(metrics),
                shutting_down: AtomicBool::new(false),
                auth_failures: std::sync::atomic::AtomicU64::new(0),
                malformed_probes: std::sync::atomic::AtomicU64::new(0),
            }),
        }
    }

    pub fn counters(&self) -> OwlCounters {
        OwlCounters {
            auth_failures: self.shared.auth_failures.load(Ordering::SeqCst),
            malformed_probes: self.shared.malformed_probes.load(Ordering::SeqCst),
        }
    }

    pub async fn add_peer(&self, peer: Peer) {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            debug!(component = "owl", peer = %peer.node_id, "rejecting new peer during shutdown");
            return;
        }
        let node_id = peer.node_id.clone();
        self.shared.peers.write().await.insert(node_id.clone(), peer);
        self.shared
            .states
            .write()
            .await
            .insert(node_id.clone(), PeerProbeState::Registered);
        self.shared
            .history
            .write()
            .await
            .entry(node_id)
            .or_insert_with(VecDeque::new);
    }

    pub async fn remove_peer(&self, node_id: &NodeId) {
        self.shared.peers.write().await.remove(node_id);
        self.shared.states.write().await.remove(node_id);
        self.shared.history.write().await.remove(node_id);
        self.shared.metrics.write().await.remove(node_id);
        self.shared.next_seq.lock().await.remove(node_id);
        self.shared
            .pending
            .lock()
            .await
            .retain(|(peer, _), _| peer != node_id);
    }

    /// Snapshot of the current metric matrix (spec.md §4.2 `metrics()`).
    pub async fn metrics_matrix(&self) -> MetricMatrix {
        self.shared.metrics.read().await.clone()
    }

    pub async fn peer_state(&self, node_id: &NodeId) -> Option<PeerProbeState> {
        self.shared.states.read().await.get(node_id).copied()
    }

    /// Runs the probe-emission loop until `cancel` reports shutdown
    /// (spec.md §5 "every loop honors a cooperative cancel signal").
    pub async fn run_probe_loop(&self, interval: Duration, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all_peers().await;
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        debug!(component = "owl", "probe loop shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Runs the inbound-datagram loop until `cancel` reports shutdown.
    pub async fn run_recv_loop(&self, mut cancel: watch::Receiver<bool>) {
        let mut buf = vec![0u8; 2048];
        loop {
            tokio::select! {
                result = self.shared.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) => self.handle_datagram(&buf[..len], from).await,
                        Err(err) => warn!(component = "owl", operation = "recv", error = %err, "socket recv failed"),
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        debug!(component = "owl", "recv loop shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn probe_all_peers(&self) {
        let peers: Vec<Peer> = self.shared.peers.read().await.values().cloned().collect();
        for peer in peers {
            if let Err(err) = self.send_ping(&peer).await {
                warn!(component = "owl", operation = "probe", peer = %peer.node_id, error = %err, "probe send failed");
            }
        }
    }

    async fn send_ping(&self, peer: &Peer) -> Result<()> {
        let seq = {
            let mut next_seq = self.shared.next_seq.lock().await;
            let entry = next_seq.entry(peer.node_id.clone()).or_insert(0);
            let seq = *entry;
            *entry = entry.wrapping_add(1);
            seq
        };
        let payload = ProbePayload::Ping {
            src: self.shared.local.as_str().to_string(),
            dest: peer.node_id.as_str().to_string(),
            seq,
            send_time_ns: now_unix_ns(),
        };
        let envelope = sign(&self.shared.secret, payload);
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|err| NetworkError::malformed_probe(err.to_string()))?;

        self.shared
            .pending
            .lock()
            .await
            .insert((peer.node_id.clone(), seq), PendingPing { sent_at: Instant::now() });

        self.shared
            .states
            .write()
            .await
            .insert(peer.node_id.clone(), PeerProbeState::Probing);

        self.shared
            .socket
            .send_to(&bytes, peer.endpoint)
            .await
            .map_err(|err| NetworkError::socket(err.to_string()))
    }

    async fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let envelope: SignedEnvelope = match serde_json::from_slice(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.shared.malformed_probes.fetch_add(1, Ordering::SeqCst);
                warn!(component = "owl", operation = "recv", from = %from, error = %err, "malformed envelope");
                return;
            }
        };
        if !verify(&self.shared.secret, &envelope) {
            self.shared.auth_failures.fetch_add(1, Ordering::SeqCst);
            warn!(component = "owl", operation = "recv", from = %from, "auth failure");
            return;
        }
        match envelope.payload {
            ProbePayload::Ping { src, seq, .. } => {
                if let Err(err) = self.reply_pong(&src, seq, from).await {
                    warn!(component = "owl", operation = "reply", peer = %src, error = %err, "pong send failed");
                }
            }
            ProbePayload::Pong {
                src,
                seq,
                original_send_time_ns,
                ..
            } => {
                self.handle_pong(src, seq, original_send_time_ns).await;
            }
        }
    }

    async fn reply_pong(&self, requester: &str, seq: u32, to: SocketAddr) -> Result<()> {
        let requester_id = NodeId::new(requester.to_string())
            .map_err(|err| NetworkError::malformed_probe(err.to_string()))?;
        let payload = ProbePayload::Pong {
            src: self.shared.local.as_str().to_string(),
            dest: requester_id.as_str().to_string(),
            seq,
            original_send_time_ns: 0,
            reply_time_ns: now_unix_ns(),
        };
        let envelope = sign(&self.shared.secret, payload);
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|err| NetworkError::malformed_probe(err.to_string()))?;
        self.shared
            .socket
            .send_to(&bytes, to)
            .await
            .map_err(|err| NetworkError::socket(err.to_string()))
    }

    async fn handle_pong(&self, src: String, seq: u32, _original_send_time_ns: u64) {
        let peer_id = match NodeId::new(src) {
            Ok(id) => id,
            Err(_) => return,
        };
        let pending = self
            .shared
            .pending
            .lock()
            .await
            .remove(&(peer_id.clone(), seq));
        let Some(pending) = pending else {
            debug!(component = "owl", peer = %peer_id, seq, "pong for unknown or expired ping");
            return;
        };
        let latency_ms = pending.sent_at.elapsed().as_secs_f64() * 1000.0;
        self.record_result(&peer_id, seq, Some(latency_ms)).await;
        self.shared
            .states
            .write()
            .await
            .insert(peer_id, PeerProbeState::Responsive);
    }

    /// Marks pings older than `timeout` and still pending as lost
    /// (spec.md §4.2 "a ping not answered within the timeout window is
    /// recorded as lost").
    pub async fn reap_timeouts(&self, timeout: Duration) {
        let now = Instant::now();
        let expired: Vec<(NodeId, u32)> = {
            let pending = self.shared.pending.lock().await;
            pending
                .iter()
                .filter(|(_, p)| now.duration_since(p.sent_at) > timeout)
                .map(|(key, _)| key.clone())
                .collect()
        };
        for (peer_id, seq) in expired {
            self.shared.pending.lock().await.remove(&(peer_id.clone(), seq));
            self.record_result(&peer_id, seq, None).await;
        }
        self.prune_silent_peers(timeout).await;
    }

    /// Graceful stop: stop accepting new peers, wait one `probe_interval`
    /// for in-flight probes to settle, then poll until pending pongs drain
    /// or `shutdown_grace` elapses (spec.md §5).
    pub async fn shutdown(&self, probe_interval: Duration, shutdown_grace: Duration) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        tokio::time::sleep(probe_interval).await;

        let deadline = Instant::now() + shutdown_grace;
        while Instant::now() < deadline {
            if self.shared.pending.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        debug!(component = "owl", "shutdown drain complete");
    }

    async fn record_result(&self, peer_id: &NodeId, seq: u32, latency_ms: Option<f64>) {
        let mut history = self.shared.history.write().await;
        let buffer = history.entry(peer_id.clone()).or_insert_with(VecDeque::new);
        let record = match latency_ms {
            Some(latency) => PingRecord::success(seq, Instant::now(), latency),
            None => PingRecord::lost(seq, Instant::now()),
        };
        buffer.push_back(record);
        while buffer.len() > HISTORY_DEPTH {
            buffer.pop_front();
        }
        drop(history);
        self.recompute_sample(peer_id).await;
    }

    async fn recompute_sample(&self, peer_id: &NodeId) {
        let history = self.shared.history.read().await;
        let Some(buffer) = history.get(peer_id) else { return };
        let now = Instant::now();
        let window: Vec<&PingRecord> = buffer
            .iter()
            .filter(|record| now.duration_since(record.send_time) <= self.shared.metric_window)
            .collect();
        drop(history);
        if window.is_empty() {
            return;
        }
        let total = window.len() as f64;
        let lost = window.iter().filter(|r| r.is_lost()).count() as f64;
        let latencies: Vec<f64> = window.iter().filter_map(|r| r.latency_ms).collect();
        let (latency_ms, jitter_ms) = if latencies.is_empty() {
            (None, 0.0)
        } else {
            let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
            let variance =
                latencies.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / latencies.len() as f64;
            (Some(mean), variance.sqrt())
        };
        let sample = MetricsSample {
            latency_ms,
            jitter_ms,
            packet_loss_percent: (lost / total) * 100.0,
            last_updated: Some(Instant::now()),
        };
        self.shared.metrics.write().await.set(peer_id.clone(), sample);
    }

    /// Demotes peers with no successful reply in the metric window to
    /// `Silent` so the topology layer can drop their edge (spec.md §4.3).
    async fn prune_silent_peers(&self, timeout: Duration) {
        let now = Instant::now();
        let silent: Vec<NodeId> = {
            let history = self.shared.history.read().await;
            history
                .iter()
                .filter(|(_, buffer)| {
                    buffer
                        .iter()
                        .rev()
                        .take_while(|r| now.duration_since(r.send_time) <= self.shared.metric_window)
                        .all(|r| r.is_lost())
                        && !buffer.is_empty()
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        let _ = timeout;
        let mut states = self.shared.states.write().await;
        for peer_id in silent {
            states.insert(peer_id, PeerProbeState::Silent);
        }
    }
}

fn now_unix_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
