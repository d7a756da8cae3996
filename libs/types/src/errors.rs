//! Errors shared across the `types` crate.

use thiserror::Error;

/// Errors raised while constructing or validating shared value types.
#[derive(Debug, Error)]
pub enum CommonError {
    /// A `NodeId` failed the length or character-set invariant.
    #[error("invalid node id {id:?}: {reason}")]
    InvalidNodeId { id: String, reason: &'static str },
}

/// Result alias used throughout the `types` crate.
pub type Result<T> = std::result::Result<T, CommonError>;
