//! Schema declaration and validation for objdb.
//!
//! A [`Schema`] is the immutable, ordered list of fields a resource accepts.
//! Field rules are written in a compact constraint language and parsed once,
//! at construction, into typed [`Constraint`]s:
//!
//! ```text
//! string|required|minlength:3|maxlength:64
//! number|min:0|integer|default:0
//! array|items:string|max:10
//! enum:pending,active,closed|default:pending
//! ```
//!
//! Validation is a pure function over the schema and an input record. It
//! never stops at the first problem: every violation is collected into a
//! [`ValidationErrors`] list so callers can report them all at once.
//!
//! ```rust
//! use objdb_schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .field("name", "string|required|minlength:2")
//!     .field("age", "number|integer|min:0")
//!     .build()
//!     .unwrap();
//!
//! let input = json!({"name": "Ada", "age": "36"});
//! let record = schema
//!     .validate(input.as_object().unwrap())
//!     .into_result()
//!     .unwrap();
//! assert_eq!(record["age"], json!(36));
//! ```

pub mod error;
pub mod field;
pub mod rule;
pub mod schema;
pub mod validate;

pub use error::{SchemaError, SchemaResult, ValidationError, ValidationErrors};
pub use field::{Constraint, FieldDef, FieldType};
pub use schema::{Schema, SchemaBuilder, UnknownFields};
pub use validate::Validated;
