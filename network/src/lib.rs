//! Consolidates the OWL measurement engine, topology model, path engine,
//! and data-plane bridge that make up the DDARP routing daemon's network
//! layer (spec.md §4.2–§4.6, components C2/C3/C4/C6).

pub mod dataplane;
pub mod error;
pub mod owl;
pub mod path;
pub mod topology;

pub use dataplane::DataPlaneBridge;
pub use error::{NetworkError, Result};
pub use owl::{OwlCounters, OwlEngine, OwlSocket, PeerProbeState, UdpOwlSocket};
pub use path::PathEngine;
pub use topology::TopologyModel;
