use serde::{Deserialize, Serialize};

/// A partition entry that could not be written or removed.
///
/// The canonical write that triggered it has already succeeded and is not
/// rolled back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSyncWarning {
    pub resource: String,
    pub partition: String,
    pub id: String,
    /// Key of the entry that is now missing or stale.
    pub key: String,
    pub message: String,
}

impl std::fmt::Display for PartitionSyncWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "partition {}/{} out of sync for id {} at {}: {}",
            self.resource, self.partition, self.id, self.key, self.message
        )
    }
}
