use std::time::Duration;

use serde::{Deserialize, Serialize};

use objdb_behavior::{BehaviorKind, DEFAULT_METADATA_BUDGET};
use objdb_schema::UnknownFields;

/// When partition entries are maintained relative to the canonical write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionSync {
    /// Writes return after their partition entries are updated.
    #[default]
    Sync,
    /// Writes return immediately; entries are updated in write order on a
    /// background task.
    Async,
}

/// Per-resource settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub behavior: BehaviorKind,
    /// Metadata bytes available per object.
    pub metadata_budget: usize,
    pub partition_sync: PartitionSync,
    /// Keep deleted records as tombstones that can be restored.
    pub soft_delete: bool,
    /// Maintain `createdAt` and `updatedAt`.
    pub timestamps: bool,
    /// Deadline for each storage call.
    pub request_timeout_ms: Option<u64>,
    /// Concurrent storage calls for fan-out reads and bulk writes.
    pub parallelism: usize,
    /// Overrides the schema's unknown-field policy when set.
    pub unknown_fields: Option<UnknownFields>,
    /// Buffered partition warnings per subscriber.
    pub warning_capacity: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            behavior: BehaviorKind::default(),
            metadata_budget: DEFAULT_METADATA_BUDGET,
            partition_sync: PartitionSync::default(),
            soft_delete: false,
            timestamps: false,
            request_timeout_ms: None,
            parallelism: 10,
            unknown_fields: None,
            warning_capacity: 256,
        }
    }
}

impl ResourceConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the engine cannot run with.
    pub fn check(&self) -> Result<(), String> {
        if self.metadata_budget < 16 {
            return Err(format!(
                "metadata_budget must be at least 16 bytes, got {}",
                self.metadata_budget
            ));
        }
        if self.parallelism == 0 {
            return Err("parallelism must be at least 1".into());
        }
        if self.warning_capacity == 0 {
            return Err("warning_capacity must be at least 1".into());
        }
        Ok(())
    }
}
