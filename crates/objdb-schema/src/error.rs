use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised while constructing a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A field name cannot be used.
    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldName { name: String, reason: String },

    /// The same field was declared twice.
    #[error("duplicate field: {0}")]
    DuplicateField(String),

    /// A rule string could not be parsed.
    #[error("invalid rule for field '{field}': {rule:?}: {reason}")]
    InvalidRule {
        field: String,
        rule: String,
        reason: String,
    },

    /// A declared default does not satisfy its own field rules.
    #[error("default for field '{field}' is invalid: {reason}")]
    InvalidDefault { field: String, reason: String },

    /// An attribute map entry is neither a rule string nor a nested object.
    #[error("invalid attribute definition for '{field}': {reason}")]
    InvalidAttribute { field: String, reason: String },
}

/// Result alias for schema construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A single failed constraint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path of the offending field (`address.city`, `tags[2]`).
    pub field: String,
    /// Short rule identifier (`required`, `type`, `minlength`, ...).
    pub rule: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.rule)
    }
}

/// Every violation found in one validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Returns `true` if some error concerns `field` with `rule`.
    pub fn has(&self, field: &str, rule: &str) -> bool {
        self.0.iter().any(|e| e.field == field && e.rule == rule)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
