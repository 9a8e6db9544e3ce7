//! Object-storage boundary for objdb.
//!
//! The engine never talks to a backend directly. Everything goes through the
//! [`StorageClient`] trait, which models the handful of requests an
//! S3-compatible service offers: `get`, `head`, `put`, `copy_metadata`,
//! `list`, and `delete` over string keys.
//!
//! # Backends and decorators
//!
//! - [`InMemoryStorageClient`] -- `BTreeMap`-based store for tests and
//!   embedding, with per-operation call counters, fault injection, latency
//!   injection, and optional metadata-budget enforcement
//! - [`TimedStorage`] -- wraps any client and fails calls that exceed a
//!   deadline with [`StoreError::Timeout`]
//!
//! # Key layout
//!
//! [`KeyLayout`] produces the key hierarchy a resource lives under:
//!
//! ```text
//! [<namespace>/]resource=<name>/id=<id>
//! [<namespace>/]resource=<name>/partition=<p>/<field>=<value>/id=<id>
//! ```
//!
//! # Design Rules
//!
//! 1. A `put` or `copy_metadata` to one key is atomic; nothing spans keys.
//! 2. The store never interprets metadata or bodies.
//! 3. Missing objects are `Ok(None)` on reads; `delete` is idempotent.
//! 4. Transient failures are propagated unchanged, never retried here.

pub mod error;
pub mod layout;
pub mod memory;
pub mod timed;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use layout::{escape_segment, unescape_segment, validate_name, KeyLayout};
pub use memory::{CallCounts, InMemoryStorageClient};
pub use timed::TimedStorage;
pub use traits::{KeyPage, ListRequest, StorageClient, StorageOp};
