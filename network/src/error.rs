//! Error taxonomy shared by the OWL engine, topology, path engine, and
//! data-plane bridge (spec.md §7).

use thiserror::Error;

/// Errors surfaced by the `network` crate.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Socket send/receive failure. Logged and counted; never tears down
    /// the engine (spec.md §4.2 "Failure semantics").
    #[error("socket error: {message}")]
    Socket { message: String },

    /// Inbound probe failed HMAC verification.
    #[error("auth failure from {peer}")]
    AuthFailure { peer: String },

    /// Malformed inbound probe envelope (bad JSON, missing fields).
    #[error("malformed probe: {message}")]
    MalformedProbe { message: String },

    /// A `DataPlaneDriver` call returned an error.
    #[error("driver call failed: {0}")]
    DriverFailure(#[from] types::dataplane::DriverError),

    /// The destination is unknown to the topology.
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    pub fn socket(message: impl Into<String>) -> Self {
        Self::Socket {
            message: message.into(),
        }
    }

    pub fn auth_failure(peer: impl Into<String>) -> Self {
        Self::AuthFailure { peer: peer.into() }
    }

    pub fn malformed_probe(message: impl Into<String>) -> Self {
        Self::MalformedProbe {
            message: message.into(),
        }
    }

    /// `true` for failures that should be logged and counted without
    /// tearing down the owning component (spec.md §7 propagation policy).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, NetworkError::DriverFailure(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            NetworkError::Socket { .. } => "socket",
            NetworkError::AuthFailure { .. } => "auth_failure",
            NetworkError::MalformedProbe { .. } => "malformed_probe",
            NetworkError::DriverFailure(_) => "driver_failure",
            NetworkError::UnknownNode(_) => "unknown_node",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_errors() {
        assert_eq!(NetworkError::socket("boom").category(), "socket");
        assert_eq!(NetworkError::auth_failure("node-a").category(), "auth_failure");
    }

    #[test]
    fn socket_errors_are_recoverable() {
        assert!(NetworkError::socket("boom").is_recoverable());
    }
}
