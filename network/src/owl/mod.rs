//! OWL (One-Way Latency) measurement engine (spec.md §4.2, component C2).

mod engine;
mod envelope;

pub use engine::{OwlCounters, OwlEngine, OwlSocket, PeerProbeState, UdpOwlSocket};
pub use envelope::{sign, verify, ProbePayload, SignedEnvelope};
