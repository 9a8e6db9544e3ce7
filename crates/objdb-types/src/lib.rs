//! Foundation types for objdb.
//!
//! objdb maps schema-validated documents onto object storage. This crate
//! holds the vocabulary every other objdb crate shares.
//!
//! # Key Types
//!
//! - [`Record`]: a document: field name to JSON value
//! - [`Metadata`]: the bounded, string-valued metadata map of an object
//! - [`StorageObject`]: metadata plus an optional body
//! - [`reserved`]: metadata keys owned by the engine rather than by fields

pub mod error;
pub mod id;
pub mod metadata;
pub mod object;
pub mod record;
pub mod reserved;

pub use error::TypeError;
pub use id::validate_id;
pub use metadata::Metadata;
pub use object::StorageObject;
pub use record::{into_record, record_id, Record, ID_FIELD};
