use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}
