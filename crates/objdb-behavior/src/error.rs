/// Errors from encoding or decoding records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BehaviorError {
    /// The record does not fit the metadata budget and the strategy does not
    /// allow spilling or shortening it.
    #[error("record {id} of resource {resource} exceeds the metadata budget by {bytes_over} bytes")]
    SizeLimitExceeded {
        resource: String,
        id: String,
        bytes_over: usize,
    },

    /// A stored value or body could not be decoded.
    #[error("corrupt stored value for '{field}': {reason}")]
    Corrupt { field: String, reason: String },

    /// The body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for behavior operations.
pub type BehaviorResult<T> = Result<T, BehaviorError>;
