use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use objdb_types::{Metadata, StorageObject};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyPage, ListRequest, StorageClient, StorageOp};

/// Number of calls made per operation, as recorded by
/// [`InMemoryStorageClient`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: u64,
    pub head: u64,
    pub put: u64,
    pub copy_metadata: u64,
    pub list: u64,
    pub delete: u64,
}

impl CallCounts {
    /// Calls that modify stored objects.
    pub fn writes(&self) -> u64 {
        self.put + self.copy_metadata + self.delete
    }
}

#[derive(Default)]
struct Counters {
    get: AtomicU64,
    head: AtomicU64,
    put: AtomicU64,
    copy_metadata: AtomicU64,
    list: AtomicU64,
    delete: AtomicU64,
}

impl Counters {
    fn slot(&self, op: StorageOp) -> &AtomicU64 {
        match op {
            StorageOp::Get => &self.get,
            StorageOp::Head => &self.head,
            StorageOp::Put => &self.put,
            StorageOp::CopyMetadata => &self.copy_metadata,
            StorageOp::List => &self.list,
            StorageOp::Delete => &self.delete,
        }
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            get: self.get.load(Ordering::Relaxed),
            head: self.head.load(Ordering::Relaxed),
            put: self.put.load(Ordering::Relaxed),
            copy_metadata: self.copy_metadata.load(Ordering::Relaxed),
            list: self.list.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for op in [
            StorageOp::Get,
            StorageOp::Head,
            StorageOp::Put,
            StorageOp::CopyMetadata,
            StorageOp::List,
            StorageOp::Delete,
        ] {
            self.slot(op).store(0, Ordering::Relaxed);
        }
    }
}

/// An injected failure: calls of `op` (any op when `None`) on keys starting
/// with `key_prefix` fail with [`StoreError::Unavailable`].
#[derive(Clone, Debug)]
struct Fault {
    op: Option<StorageOp>,
    key_prefix: String,
}

/// In-memory, `BTreeMap`-based storage client.
///
/// Intended for tests and embedding. Objects live behind a `RwLock`; no lock
/// is held across an `.await`. Every call is counted per operation so tests
/// can assert on request patterns.
pub struct InMemoryStorageClient {
    objects: RwLock<BTreeMap<String, StorageObject>>,
    max_metadata_bytes: Option<usize>,
    counters: Counters,
    faults: RwLock<Vec<Fault>>,
    latency: RwLock<Option<Duration>>,
}

impl InMemoryStorageClient {
    /// Create a new empty store with no metadata limit.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            max_metadata_bytes: None,
            counters: Counters::default(),
            faults: RwLock::new(Vec::new()),
            latency: RwLock::new(None),
        }
    }

    /// Create a store that rejects metadata larger than `limit` bytes, the
    /// way S3 rejects user metadata over 2KB.
    pub fn with_metadata_limit(limit: usize) -> Self {
        Self {
            max_metadata_bytes: Some(limit),
            ..Self::new()
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Read an object without counting the call.
    pub fn peek(&self, key: &str) -> Option<StorageObject> {
        self.objects.read().expect("lock poisoned").get(key).cloned()
    }

    /// Calls made so far.
    pub fn calls(&self) -> CallCounts {
        self.counters.snapshot()
    }

    /// Zero all call counters.
    pub fn reset_calls(&self) {
        self.counters.reset();
    }

    /// Fail future calls of `op` on keys under `key_prefix`.
    pub fn fail_on(&self, op: StorageOp, key_prefix: impl Into<String>) {
        self.faults.write().expect("lock poisoned").push(Fault {
            op: Some(op),
            key_prefix: key_prefix.into(),
        });
    }

    /// Fail every future call on keys under `key_prefix`.
    pub fn fail_all_on(&self, key_prefix: impl Into<String>) {
        self.faults.write().expect("lock poisoned").push(Fault {
            op: None,
            key_prefix: key_prefix.into(),
        });
    }

    /// Remove every injected failure.
    pub fn clear_faults(&self) {
        self.faults.write().expect("lock poisoned").clear();
    }

    /// Delay every call by `latency` (or stop delaying with `None`).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().expect("lock poisoned") = latency;
    }

    /// Count the call, apply injected latency, then check injected faults.
    async fn enter(&self, op: StorageOp, key: &str) -> StoreResult<()> {
        self.counters.slot(op).fetch_add(1, Ordering::Relaxed);

        let latency = *self.latency.read().expect("lock poisoned");
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        let faults = self.faults.read().expect("lock poisoned");
        let failing = faults
            .iter()
            .any(|f| f.op.map_or(true, |o| o == op) && key.starts_with(&f.key_prefix));
        if failing {
            return Err(StoreError::Unavailable(format!("injected {op} failure on {key}")));
        }
        Ok(())
    }

    fn check_metadata(&self, key: &str, metadata: &Metadata) -> StoreResult<()> {
        if let Some(limit) = self.max_metadata_bytes {
            let size = metadata.byte_size();
            if size > limit {
                return Err(StoreError::MetadataTooLarge {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStorageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn get(&self, key: &str) -> StoreResult<Option<StorageObject>> {
        self.enter(StorageOp::Get, key).await?;
        Ok(self.peek(key))
    }

    async fn head(&self, key: &str) -> StoreResult<Option<Metadata>> {
        self.enter(StorageOp::Head, key).await?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|obj| obj.metadata.clone()))
    }

    async fn put(&self, key: &str, metadata: Metadata, body: Option<Bytes>) -> StoreResult<()> {
        self.enter(StorageOp::Put, key).await?;
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".into()));
        }
        self.check_metadata(key, &metadata)?;
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(key.to_string(), StorageObject::new(metadata, body));
        Ok(())
    }

    async fn copy_metadata(&self, key: &str, metadata: Metadata) -> StoreResult<()> {
        self.enter(StorageOp::CopyMetadata, key).await?;
        self.check_metadata(key, &metadata)?;
        let mut map = self.objects.write().expect("lock poisoned");
        match map.get_mut(key) {
            Some(obj) => {
                obj.metadata = metadata;
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn list(&self, prefix: &str, request: &ListRequest) -> StoreResult<KeyPage> {
        self.enter(StorageOp::List, prefix).await?;
        let map = self.objects.read().expect("lock poisoned");

        let lower = match &request.start_after {
            Some(cursor) if cursor.as_str() >= prefix => Bound::Excluded(cursor.clone()),
            _ => Bound::Included(prefix.to_string()),
        };
        let limit = request.max_keys.unwrap_or(usize::MAX);

        let mut matching = map
            .range::<String, _>((lower, Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(limit).cloned().collect();
        let more = matching.next().is_some();
        let next_start_after = if more { keys.last().cloned() } else { None };

        Ok(KeyPage {
            keys,
            next_start_after,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.enter(StorageOp::Delete, key).await?;
        self.objects.write().expect("lock poisoned").remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorageClient")
            .field("object_count", &self.len())
            .field("max_metadata_bytes", &self.max_metadata_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryStorageClient::new();
        store
            .put("a", meta(&[("0", "x")]), Some(Bytes::from_static(b"body")))
            .await
            .unwrap();

        let obj = store.get("a").await.unwrap().expect("should exist");
        assert_eq!(obj.metadata.get("0"), Some("x"));
        assert_eq!(obj.body.as_deref(), Some(&b"body"[..]));
    }

    #[tokio::test]
    async fn head_returns_metadata_only() {
        let store = InMemoryStorageClient::new();
        store.put("a", meta(&[("k", "v")]), None).await.unwrap();
        let head = store.head("a").await.unwrap().unwrap();
        assert_eq!(head.get("k"), Some("v"));
        assert!(store.head("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_get_is_none() {
        let store = InMemoryStorageClient::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn copy_metadata_keeps_body() {
        let store = InMemoryStorageClient::new();
        store
            .put("a", meta(&[("k", "1")]), Some(Bytes::from_static(b"payload")))
            .await
            .unwrap();
        store.copy_metadata("a", meta(&[("k", "2")])).await.unwrap();

        let obj = store.peek("a").unwrap();
        assert_eq!(obj.metadata.get("k"), Some("2"));
        assert_eq!(obj.body.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn copy_metadata_on_missing_fails() {
        let store = InMemoryStorageClient::new();
        let err = store.copy_metadata("ghost", Metadata::new()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".into()));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryStorageClient::new();
        store.put("a", Metadata::new(), None).await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let store = InMemoryStorageClient::new();
        for key in ["r/id=1", "r/id=2", "r/partition=p/id=1", "s/id=1"] {
            store.put(key, Metadata::new(), None).await.unwrap();
        }
        let page = store.list("r/id=", &ListRequest::all()).await.unwrap();
        assert_eq!(page.keys, vec!["r/id=1", "r/id=2"]);
        assert!(page.next_start_after.is_none());
    }

    #[tokio::test]
    async fn list_paginates() {
        let store = InMemoryStorageClient::new();
        for i in 0..5 {
            store.put(&format!("p/{i}"), Metadata::new(), None).await.unwrap();
        }

        let first = store.list("p/", &ListRequest::page(None, 2)).await.unwrap();
        assert_eq!(first.keys, vec!["p/0", "p/1"]);
        assert_eq!(first.next_start_after.as_deref(), Some("p/1"));

        let second = store
            .list("p/", &ListRequest::page(first.next_start_after, 3))
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["p/2", "p/3", "p/4"]);
        assert!(second.next_start_after.is_none());
    }

    #[tokio::test]
    async fn list_all_follows_cursors() {
        let store = InMemoryStorageClient::new();
        for i in 0..3 {
            store.put(&format!("x/{i}"), Metadata::new(), None).await.unwrap();
        }
        let keys = store.list_all("x/").await.unwrap();
        assert_eq!(keys.len(), 3);
    }

    // -----------------------------------------------------------------------
    // Instrumentation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn counts_calls_per_operation() {
        let store = InMemoryStorageClient::new();
        store.put("a", Metadata::new(), None).await.unwrap();
        store.head("a").await.unwrap();
        store.copy_metadata("a", Metadata::new()).await.unwrap();
        store.get("a").await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.put, 1);
        assert_eq!(calls.head, 1);
        assert_eq!(calls.copy_metadata, 1);
        assert_eq!(calls.get, 1);
        assert_eq!(calls.writes(), 2);

        store.reset_calls();
        assert_eq!(store.calls(), CallCounts::default());
    }

    #[tokio::test]
    async fn metadata_limit_is_enforced() {
        let store = InMemoryStorageClient::with_metadata_limit(4);
        let err = store
            .put("a", meta(&[("key", "value")]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MetadataTooLarge { size: 8, limit: 4, .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn injected_faults_match_op_and_prefix() {
        let store = InMemoryStorageClient::new();
        store.fail_on(StorageOp::Put, "bad/");

        assert!(store.put("good/1", Metadata::new(), None).await.is_ok());
        let err = store.put("bad/1", Metadata::new(), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.get("bad/1").await.is_ok());

        store.clear_faults();
        assert!(store.put("bad/1", Metadata::new(), None).await.is_ok());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryStorageClient::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryStorageClient"));
        assert!(debug.contains("object_count"));
    }
}
