//! The partition index manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use objdb_store::{KeyLayout, ListRequest, StorageClient};
use objdb_types::{record_id, reserved, Metadata, Record};

use crate::definition::PartitionDefinition;
use crate::error::{PartitionError, PartitionResult};
use crate::warning::PartitionSyncWarning;

/// One page of ids from a partition listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdPage {
    pub ids: Vec<String>,
    /// Cursor for the next page, `None` when the listing is exhausted.
    pub next_start_after: Option<String>,
}

/// Maintains the partition entries of one resource.
///
/// Entries are pointer objects: an empty body and a single `_ref` metadata
/// key holding the canonical key. Every maintenance method returns the
/// warnings it produced instead of failing; an empty vector means the index
/// is in step with the record.
pub struct PartitionIndex {
    resource: String,
    layout: KeyLayout,
    storage: Arc<dyn StorageClient>,
    definitions: Vec<PartitionDefinition>,
}

impl std::fmt::Debug for PartitionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionIndex")
            .field("resource", &self.resource)
            .field("root", &self.layout.root())
            .field(
                "partitions",
                &self.definitions.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PartitionIndex {
    pub fn new(
        resource: impl Into<String>,
        layout: KeyLayout,
        storage: Arc<dyn StorageClient>,
        definitions: Vec<PartitionDefinition>,
    ) -> Self {
        Self {
            resource: resource.into(),
            layout,
            storage,
            definitions,
        }
    }

    pub fn definitions(&self) -> &[PartitionDefinition] {
        &self.definitions
    }

    /// Returns `true` if the resource has no partitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definition(&self, name: &str) -> PartitionResult<&PartitionDefinition> {
        self.definitions
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| PartitionError::UnknownPartition(name.to_string()))
    }

    pub(crate) fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub(crate) fn storage(&self) -> &Arc<dyn StorageClient> {
        &self.storage
    }

    pub(crate) fn resource(&self) -> &str {
        &self.resource
    }

    /// Entry keys of `record`, by partition name. Partitions whose fields
    /// are not all present are omitted.
    pub fn entry_keys(&self, record: &Record) -> BTreeMap<String, String> {
        let Some(id) = record_id(record) else {
            return BTreeMap::new();
        };
        self.definitions
            .iter()
            .filter_map(|def| {
                let segments = def.segments(record)?;
                Some((
                    def.name().to_string(),
                    self.layout.partition_key(def.name(), &segments, id),
                ))
            })
            .collect()
    }

    /// The partition that can answer `filter` exactly, with its segments.
    pub fn match_filter(&self, filter: &Record) -> Option<(&PartitionDefinition, Vec<(String, String)>)> {
        self.definitions
            .iter()
            .find_map(|def| Some((def, def.segments_for_filter(filter)?)))
    }

    // ---------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------

    /// Write an entry in every partition the record belongs to.
    pub async fn on_insert(&self, record: &Record) -> Vec<PartitionSyncWarning> {
        self.on_update(None, record).await
    }

    /// Move entries whose key changed between `old` and `new`.
    ///
    /// For each partition the new entry is written before the old one is
    /// removed. Unchanged keys are left alone. `old = None` treats the write
    /// as an insert.
    pub async fn on_update(&self, old: Option<&Record>, new: &Record) -> Vec<PartitionSyncWarning> {
        let Some(id) = record_id(new) else {
            return Vec::new();
        };
        let old_keys = old.map(|r| self.entry_keys(r)).unwrap_or_default();
        let new_keys = self.entry_keys(new);
        let pointer = self.pointer(id);

        let mut warnings = Vec::new();
        for def in &self.definitions {
            let name = def.name();
            let before = old_keys.get(name);
            let after = new_keys.get(name);
            if before == after {
                continue;
            }
            if let Some(key) = after {
                self.write_entry(name, id, key, pointer.clone(), &mut warnings).await;
            }
            if let Some(key) = before {
                self.remove_entry(name, id, key, &mut warnings).await;
            }
        }
        warnings
    }

    /// Remove every entry of the record.
    pub async fn on_delete(&self, record: &Record) -> Vec<PartitionSyncWarning> {
        let Some(id) = record_id(record) else {
            return Vec::new();
        };
        let mut warnings = Vec::new();
        for (name, key) in self.entry_keys(record) {
            self.remove_entry(&name, id, &key, &mut warnings).await;
        }
        warnings
    }

    pub(crate) fn pointer(&self, id: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(reserved::REFERENCE, self.layout.canonical_key(id));
        metadata
    }

    pub(crate) async fn write_entry(
        &self,
        partition: &str,
        id: &str,
        key: &str,
        pointer: Metadata,
        warnings: &mut Vec<PartitionSyncWarning>,
    ) -> bool {
        match self.storage.put(key, pointer, None).await {
            Ok(()) => {
                tracing::debug!(resource = %self.resource, partition, id, key, "partition entry written");
                true
            }
            Err(e) => {
                warnings.push(self.warning(partition, id, key, format!("write failed: {e}")));
                false
            }
        }
    }

    pub(crate) async fn remove_entry(
        &self,
        partition: &str,
        id: &str,
        key: &str,
        warnings: &mut Vec<PartitionSyncWarning>,
    ) -> bool {
        match self.storage.delete(key).await {
            Ok(()) => {
                tracing::debug!(resource = %self.resource, partition, id, key, "partition entry removed");
                true
            }
            Err(e) => {
                warnings.push(self.warning(partition, id, key, format!("delete failed: {e}")));
                false
            }
        }
    }

    fn warning(&self, partition: &str, id: &str, key: &str, message: String) -> PartitionSyncWarning {
        let warning = PartitionSyncWarning {
            resource: self.resource.clone(),
            partition: partition.to_string(),
            id: id.to_string(),
            key: key.to_string(),
            message,
        };
        tracing::warn!(%warning, "partition sync warning");
        warning
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    /// List ids in `partition` whose projected values equal `values`.
    ///
    /// `values` must name exactly the partition's fields.
    pub async fn list(
        &self,
        partition: &str,
        values: &Record,
        request: &ListRequest,
    ) -> PartitionResult<IdPage> {
        let segments = self.segments_for(partition, values)?;
        self.list_segments(partition, &segments, request).await
    }

    /// List ids under already-projected segments.
    pub async fn list_segments(
        &self,
        partition: &str,
        segments: &[(String, String)],
        request: &ListRequest,
    ) -> PartitionResult<IdPage> {
        let prefix = self.layout.partition_prefix(partition, segments);
        let page = self.storage.list(&prefix, request).await?;
        tracing::debug!(resource = %self.resource, partition, keys = page.keys.len(), "partition listed");
        Ok(IdPage {
            ids: ids_of(&page.keys),
            next_start_after: page.next_start_after,
        })
    }

    /// Number of entries in `partition` matching `values`.
    pub async fn count(&self, partition: &str, values: &Record) -> PartitionResult<usize> {
        let segments = self.segments_for(partition, values)?;
        let prefix = self.layout.partition_prefix(partition, &segments);
        Ok(self.storage.list_all(&prefix).await?.len())
    }

    fn segments_for(&self, partition: &str, values: &Record) -> PartitionResult<Vec<(String, String)>> {
        let def = self.definition(partition)?;
        def.segments_for_filter(values)
            .ok_or_else(|| PartitionError::ValueMismatch {
                partition: partition.to_string(),
                reason: format!(
                    "expected values for [{}]",
                    def.fields()
                        .iter()
                        .map(|f| f.path.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }
}

pub(crate) fn ids_of(keys: &[String]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| KeyLayout::id_from_key(k))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_store::{InMemoryStorageClient, StorageOp};
    use serde_json::{json, Value};

    fn rec(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn setup() -> (Arc<InMemoryStorageClient>, PartitionIndex) {
        let store = Arc::new(InMemoryStorageClient::new());
        let layout = KeyLayout::new(None, "orders").unwrap();
        let defs = vec![
            PartitionDefinition::new("byRegion")
                .unwrap()
                .field("region", "string")
                .unwrap(),
            PartitionDefinition::new("byRegionStatus")
                .unwrap()
                .field("region", "string")
                .unwrap()
                .field("status", "string")
                .unwrap(),
        ];
        let index = PartitionIndex::new("orders", layout, store.clone(), defs);
        (store, index)
    }

    fn region(r: &str) -> Record {
        rec(json!({ "region": r }))
    }

    #[tokio::test]
    async fn insert_writes_pointer_entries() {
        let (store, index) = setup();
        let record = rec(json!({"id": "o1", "region": "EU", "status": "open"}));
        assert!(index.on_insert(&record).await.is_empty());

        let keys = store.keys();
        assert_eq!(
            keys,
            vec![
                "resource=orders/partition=byRegion/region=EU/id=o1".to_string(),
                "resource=orders/partition=byRegionStatus/region=EU/status=open/id=o1".to_string(),
            ]
        );
        let entry = store.peek(&keys[0]).unwrap();
        assert_eq!(entry.metadata.get("_ref"), Some("resource=orders/id=o1"));
        assert!(entry.body.is_none());
    }

    #[tokio::test]
    async fn records_missing_fields_are_skipped() {
        let (store, index) = setup();
        let record = rec(json!({"id": "o1", "region": "EU"}));
        index.on_insert(&record).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_migrates_entries() {
        let (store, index) = setup();
        let old = rec(json!({"id": "o1", "region": "US", "status": "open"}));
        let new = rec(json!({"id": "o1", "region": "EU", "status": "open"}));
        index.on_insert(&old).await;
        store.reset_calls();

        assert!(index.on_update(Some(&old), &new).await.is_empty());

        let calls = store.calls();
        assert_eq!(calls.put, 2);
        assert_eq!(calls.delete, 2);

        let us = index.list("byRegion", &region("US"), &ListRequest::all()).await.unwrap();
        let eu = index.list("byRegion", &region("EU"), &ListRequest::all()).await.unwrap();
        assert!(us.ids.is_empty());
        assert_eq!(eu.ids, vec!["o1".to_string()]);
    }

    #[tokio::test]
    async fn unchanged_keys_are_noops() {
        let (store, index) = setup();
        let old = rec(json!({"id": "o1", "region": "EU", "status": "open", "total": 1}));
        let new = rec(json!({"id": "o1", "region": "EU", "status": "open", "total": 2}));
        index.on_insert(&old).await;
        store.reset_calls();

        index.on_update(Some(&old), &new).await;
        assert_eq!(store.calls().writes(), 0);
    }

    #[tokio::test]
    async fn new_entry_written_before_old_removed() {
        let (store, index) = setup();
        let old = rec(json!({"id": "o1", "region": "US"}));
        let new = rec(json!({"id": "o1", "region": "EU"}));
        index.on_insert(&old).await;

        // The old entry's delete fails: the record is then in both
        // partitions, never in neither.
        store.fail_on(StorageOp::Delete, "resource=orders/partition=byRegion/region=US");
        let warnings = index.on_update(Some(&old), &new).await;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].partition, "byRegion");
        assert_eq!(warnings[0].id, "o1");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn write_failures_become_warnings() {
        let (store, index) = setup();
        store.fail_on(StorageOp::Put, "resource=orders/partition=");
        let record = rec(json!({"id": "o1", "region": "EU", "status": "open"}));
        let warnings = index.on_insert(&record).await;
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].message.contains("write failed"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_entries() {
        let (store, index) = setup();
        let record = rec(json!({"id": "o1", "region": "EU", "status": "open"}));
        index.on_insert(&record).await;
        assert!(index.on_delete(&record).await.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_pages_and_count() {
        let (_store, index) = setup();
        for i in 0..5 {
            let record = rec(json!({"id": format!("o{i}"), "region": "EU"}));
            index.on_insert(&record).await;
        }
        index.on_insert(&rec(json!({"id": "x", "region": "EUR"}))).await;

        assert_eq!(index.count("byRegion", &region("EU")).await.unwrap(), 5);

        let first = index
            .list("byRegion", &region("EU"), &ListRequest::page(None, 3))
            .await
            .unwrap();
        assert_eq!(first.ids, vec!["o0", "o1", "o2"]);
        let second = index
            .list("byRegion", &region("EU"), &ListRequest::page(first.next_start_after, 3))
            .await
            .unwrap();
        assert_eq!(second.ids, vec!["o3", "o4"]);
        assert!(second.next_start_after.is_none());
    }

    #[tokio::test]
    async fn values_with_separators_are_escaped() {
        let (_store, index) = setup();
        let record = rec(json!({"id": "o1", "region": "a/b=c"}));
        index.on_insert(&record).await;
        let page = index.list("byRegion", &region("a/b=c"), &ListRequest::all()).await.unwrap();
        assert_eq!(page.ids, vec!["o1"]);
    }

    #[tokio::test]
    async fn listing_errors() {
        let (_store, index) = setup();
        assert!(matches!(
            index.list("nope", &region("EU"), &ListRequest::all()).await,
            Err(PartitionError::UnknownPartition(_))
        ));
        assert!(matches!(
            index.count("byRegionStatus", &region("EU")).await,
            Err(PartitionError::ValueMismatch { .. })
        ));
    }

    #[test]
    fn match_filter_picks_exact_partition() {
        let (_store, index) = setup();
        let (def, segs) = index
            .match_filter(&rec(json!({"status": "open", "region": "EU"})))
            .unwrap();
        assert_eq!(def.name(), "byRegionStatus");
        assert_eq!(segs.len(), 2);
        assert!(index.match_filter(&rec(json!({"status": "open"}))).is_none());
    }
}
