use std::time::Duration;

use crate::traits::StorageOp;

/// Errors from storage client operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed object does not exist (only for operations that require
    /// an existing object, such as `copy_metadata`).
    #[error("object not found: {0}")]
    NotFound(String),

    /// The call did not complete before its deadline.
    #[error("{op} on {key} timed out after {after:?}")]
    Timeout {
        op: StorageOp,
        key: String,
        after: Duration,
    },

    /// The backend could not serve the request (network, throttling, outage).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend refused metadata larger than its limit.
    #[error("metadata for {key} is {size} bytes, limit is {limit}")]
    MetadataTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    /// A key or key segment is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
