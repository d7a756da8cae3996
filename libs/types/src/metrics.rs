//! Measurement history and derived metrics (spec.md §3, §4.2).

use crate::node::NodeId;
use std::collections::HashMap;
use std::time::Instant;

/// Capacity of the per-peer ping history ring (spec.md §3).
pub const HISTORY_DEPTH: usize = 100;

/// One probe outcome: a successful round trip or a timeout.
///
/// Produced by the OWL engine and stored in a bounded ring per peer;
/// dropped on ring overwrite or peer removal.
#[derive(Debug, Clone, Copy)]
pub struct PingRecord {
    pub sequence: u32,
    pub send_time: Instant,
    /// `None` marks a lost probe (no pong within `probe_timeout`).
    pub latency_ms: Option<f64>,
}

impl PingRecord {
    pub fn success(sequence: u32, send_time: Instant, latency_ms: f64) -> Self {
        Self {
            sequence,
            send_time,
            latency_ms: Some(latency_ms),
        }
    }

    pub fn lost(sequence: u32, send_time: Instant) -> Self {
        Self {
            sequence,
            send_time,
            latency_ms: None,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.latency_ms.is_none()
    }
}

/// Derived link-quality metrics for an ordered (source, destination) pair.
///
/// All fields are derived data: invalidated on peer removal and recomputed
/// from the ping history ring every `metric_window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSample {
    /// Absent until the first successful round trip.
    pub latency_ms: Option<f64>,
    /// Population stdev over recent successful samples; `0.0` with fewer
    /// than two successes.
    pub jitter_ms: f64,
    /// Fraction, as a percentage, of records in the window marked lost.
    pub packet_loss_percent: f64,
    pub last_updated: Option<Instant>,
}

impl MetricsSample {
    /// `true` once at least one observation has been recorded.
    pub fn has_measurement(&self) -> bool {
        self.last_updated.is_some()
    }
}

/// The local node's row of the N×N link-quality matrix.
///
/// Keyed by destination `NodeId`. The local node always owns its own row;
/// rows received from peers are out of scope here (spec.md §9: matrix
/// sync between peers is never wired to a transport in the source and is
/// explicitly out of scope for this design).
#[derive(Debug, Clone, Default)]
pub struct MetricMatrix {
    pub local: NodeId,
    pub row: HashMap<NodeId, MetricsSample>,
}

impl MetricMatrix {
    pub fn new(local: NodeId) -> Self {
        Self {
            local,
            row: HashMap::new(),
        }
    }

    pub fn get(&self, dest: &NodeId) -> Option<&MetricsSample> {
        self.row.get(dest)
    }

    pub fn set(&mut self, dest: NodeId, sample: MetricsSample) {
        self.row.insert(dest, sample);
    }

    pub fn remove(&mut self, dest: &NodeId) {
        self.row.remove(dest);
    }
}
