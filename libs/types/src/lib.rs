//! Shared value types for the DDARP routing daemon.
//!
//! This crate holds the data model common to the wire codec, the OWL
//! engine, the topology model, and the path engine: node identity, peer
//! records, measurement history, derived metrics, and the routing table.
//! None of these types own I/O or scheduling — they are plain data plus
//! the invariants that keep them consistent, so every other crate in the
//! workspace can depend on `types` without pulling in tokio.

pub mod dataplane;
pub mod errors;
pub mod metrics;
pub mod node;
pub mod route;
pub mod topology;

pub use dataplane::{DataPlaneDriver, DriverStatus};
pub use errors::{CommonError, Result};
pub use metrics::{MetricMatrix, MetricsSample, PingRecord};
pub use node::{NodeId, Peer};
pub use route::{Route, RoutingTable};
pub use topology::{Edge, NodeType, TopologyNode};
