//! High-level SDK for objdb.
//!
//! A [`Database`] holds one storage client, an optional namespace and a
//! registry of [`Resource`]s. Resources can be declared in code or loaded
//! from a TOML [`DatabaseConfig`]. This is the main entry point for
//! applications embedding objdb.

pub mod config;
pub mod database;
pub mod error;

pub use config::{DatabaseConfig, ResourceDefinition};
pub use database::Database;
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use objdb_behavior::BehaviorKind;
pub use objdb_engine::{
    EngineError, EngineResult, ListOptions, Page, PartitionSync, Resource, ResourceBuilder,
    ResourceConfig,
};
pub use objdb_partition::{PartitionDefinition, PartitionSyncWarning};
pub use objdb_schema::{Schema, UnknownFields, ValidationErrors};
pub use objdb_store::{InMemoryStorageClient, StorageClient};
pub use objdb_types::{into_record, Record};
