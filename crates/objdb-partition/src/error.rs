//! Error types for the partition crate.

/// Errors from defining or listing partitions.
///
/// Entry writes never produce these; they are reported as
/// [`PartitionSyncWarning`](crate::PartitionSyncWarning)s instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    /// The partition definition is malformed or does not fit the schema.
    #[error("invalid partition '{partition}': {reason}")]
    InvalidDefinition { partition: String, reason: String },

    /// No partition with this name exists on the resource.
    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    /// Listing values do not match the partition's field set.
    #[error("values do not match partition '{partition}': {reason}")]
    ValueMismatch { partition: String, reason: String },

    /// Storage operation failed.
    #[error("store error: {0}")]
    Store(#[from] objdb_store::StoreError),
}

/// Convenience alias for partition results.
pub type PartitionResult<T> = Result<T, PartitionError>;
