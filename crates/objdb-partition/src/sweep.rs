//! Reconciliation of partition entries against live records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use objdb_types::{record_id, Record};

use crate::error::PartitionResult;
use crate::index::PartitionIndex;
use crate::warning::PartitionSyncWarning;

/// What a sweep found and repaired.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Live records considered.
    pub records: usize,
    /// Existing entries inspected across all partitions.
    pub entries: usize,
    /// Keys of missing entries that were written.
    pub written: Vec<String>,
    /// Keys of orphaned or stale entries that were removed.
    pub removed: Vec<String>,
    /// Repairs that failed.
    pub warnings: Vec<PartitionSyncWarning>,
}

impl SweepReport {
    /// Returns `true` if the index already matched the records.
    pub fn is_clean(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty() && self.warnings.is_empty()
    }
}

impl PartitionIndex {
    /// Bring every partition in line with `live`, the complete set of live
    /// records of the resource.
    ///
    /// Entries for records not in `live`, or under a key the record no
    /// longer projects to, are removed; missing entries are written. A
    /// failed listing aborts the sweep; failed repairs are reported.
    pub async fn sweep(&self, live: &[Record]) -> PartitionResult<SweepReport> {
        let mut report = SweepReport {
            records: live.len(),
            ..SweepReport::default()
        };

        let mut expected: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for record in live {
            let Some(id) = record_id(record) else { continue };
            for (partition, key) in self.entry_keys(record) {
                expected
                    .entry(partition)
                    .or_default()
                    .insert(key, id.to_string());
            }
        }

        for def in self.definitions() {
            let name = def.name();
            let root = self.layout().partition_root(name);
            let actual: BTreeSet<String> = self.storage().list_all(&root).await?.into_iter().collect();
            report.entries += actual.len();

            let wanted = expected.remove(name).unwrap_or_default();

            for (key, id) in &wanted {
                if actual.contains(key) {
                    continue;
                }
                if self
                    .write_entry(name, id, key, self.pointer(id), &mut report.warnings)
                    .await
                {
                    tracing::warn!(resource = self.resource(), partition = name, key = %key, "sweep wrote missing partition entry");
                    report.written.push(key.clone());
                }
            }

            for key in actual.iter().filter(|k| !wanted.contains_key(*k)) {
                let id = objdb_store::KeyLayout::id_from_key(key).unwrap_or_default();
                if self.remove_entry(name, id, key, &mut report.warnings).await {
                    tracing::warn!(resource = self.resource(), partition = name, key = %key, "sweep removed orphaned partition entry");
                    report.removed.push(key.clone());
                }
            }
        }

        tracing::debug!(
            resource = self.resource(),
            records = report.records,
            entries = report.entries,
            written = report.written.len(),
            removed = report.removed.len(),
            "partition sweep finished"
        );
        Ok(report)
    }
}
