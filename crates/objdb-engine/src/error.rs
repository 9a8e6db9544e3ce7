//! Error types for the engine crate.

use std::time::Duration;

use objdb_partition::PartitionError;
use objdb_schema::{SchemaError, ValidationErrors};
use objdb_store::{StorageOp, StoreError};

/// Errors returned by resource operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The input failed validation; nothing was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No live record has this id.
    #[error("{resource}/{id} not found")]
    NotFound { resource: String, id: String },

    /// An insert collided with an existing record.
    #[error("{resource}/{id} already exists")]
    DuplicateId { resource: String, id: String },

    /// The record does not fit the metadata budget under `enforce-limits`.
    #[error("{resource}/{id} exceeds the metadata budget by {bytes_over} bytes")]
    SizeLimitExceeded {
        resource: String,
        id: String,
        bytes_over: usize,
    },

    /// A storage call missed its deadline.
    #[error("storage {op} on {key} timed out after {after:?}")]
    StorageTimeout {
        op: StorageOp,
        key: String,
        after: Duration,
    },

    /// The storage backend could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// A stored object could not be decoded.
    #[error("corrupt object {resource}/{id}: {reason}")]
    Corrupt {
        resource: String,
        id: String,
        reason: String,
    },

    /// An observer or middleware refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A partition listing was asked for something the resource does not
    /// define.
    #[error("invalid partition query: {0}")]
    InvalidQuery(String),

    /// The resource definition or configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background task failed or an operation produced an unexpected
    /// outcome.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Transient failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageTimeout { .. } | Self::StorageUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Timeout { op, key, after } => Self::StorageTimeout { op, key, after },
            StoreError::Unavailable(reason) => Self::StorageUnavailable(reason),
            other => Self::Storage(other),
        }
    }
}

impl From<PartitionError> for EngineError {
    fn from(e: PartitionError) -> Self {
        match e {
            PartitionError::Store(store) => store.into(),
            PartitionError::InvalidDefinition { .. } => Self::Config(e.to_string()),
            other => Self::InvalidQuery(other.to_string()),
        }
    }
}

impl From<SchemaError> for EngineError {
    fn from(e: SchemaError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_taxonomy() {
        let timeout: EngineError = StoreError::Timeout {
            op: StorageOp::Get,
            key: "k".into(),
            after: Duration::from_millis(5),
        }
        .into();
        assert!(matches!(timeout, EngineError::StorageTimeout { op: StorageOp::Get, .. }));
        assert!(timeout.is_retryable());

        let down: EngineError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(down, EngineError::StorageUnavailable(_)));

        let other: EngineError = StoreError::InvalidKey("x".into()).into();
        assert!(matches!(other, EngineError::Storage(_)));
        assert!(!other.is_retryable());
    }

    #[test]
    fn partition_errors_map_to_taxonomy() {
        let e: EngineError = PartitionError::UnknownPartition("p".into()).into();
        assert!(matches!(e, EngineError::InvalidQuery(_)));
        let e: EngineError = PartitionError::Store(StoreError::Unavailable("x".into())).into();
        assert!(matches!(e, EngineError::StorageUnavailable(_)));
    }
}
