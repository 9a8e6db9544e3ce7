//! Resource engine for objdb.
//!
//! A [`Resource`] is a schema-validated collection of records kept in object
//! storage. Each record is one canonical object; a
//! [`Behavior`](objdb_behavior::Behavior) decides how its fields are split
//! between the object's bounded metadata and its body, and partition entries
//! give filtered listings that scan only the matching subtree.
//!
//! # Key Types
//!
//! - [`Resource`] -- CRUD, listing and queries over one resource
//! - [`ResourceBuilder`] -- schema, partitions, observers and middleware
//! - [`ResourceConfig`] -- behavior, metadata budget, partition sync mode
//! - [`ResourceObserver`] -- before/after hooks around writes
//! - [`Middleware`] -- explicit chain around every operation
//!
//! # Request patterns
//!
//! The engine picks the cheapest correct request pattern per mutation.
//! `update` reads the whole object and writes it back. `patch` produces the
//! same result, but when the behavior keeps every field in metadata it reads
//! only the metadata and rewrites it in place with a server-side copy.
//! `replace` writes without reading first.
//!
//! # Consistency
//!
//! Canonical writes are atomic per key. Partition entries are best effort:
//! failures surface as [`PartitionSyncWarning`](objdb_partition::PartitionSyncWarning)s
//! on [`Resource::subscribe_warnings`] and never fail the write. Concurrent
//! writers to the same id are last-write-wins.

pub mod config;
mod engine;
pub mod error;
mod fanout;
pub mod middleware;
pub mod observer;
pub mod options;
pub mod resource;

pub use config::{PartitionSync, ResourceConfig};
pub use engine::{CREATED_AT, UPDATED_AT};
pub use error::{EngineError, EngineResult};
pub use middleware::{Middleware, Next, Operation, OperationHandler, Outcome};
pub use observer::{NoOpObserver, ResourceObserver};
pub use options::{matches_filter, ListOptions, Page, PartitionFilter};
pub use resource::{Resource, ResourceBuilder};
