use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use objdb_types::{Metadata, StorageObject};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyPage, ListRequest, StorageClient, StorageOp};

/// Deadline decorator over any [`StorageClient`].
///
/// Each call gets its own deadline; when it expires the in-flight request is
/// dropped and the call fails with [`StoreError::Timeout`]. Without a
/// deadline the decorator is a pass-through.
#[derive(Clone)]
pub struct TimedStorage {
    inner: Arc<dyn StorageClient>,
    deadline: Option<Duration>,
}

impl TimedStorage {
    pub fn new(inner: Arc<dyn StorageClient>, deadline: Option<Duration>) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    async fn run<T, F>(&self, op: StorageOp, key: &str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        tracing::trace!(%op, key, "storage call");
        match self.deadline {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| StoreError::Timeout {
                    op,
                    key: key.to_string(),
                    after,
                })?,
            None => call.await,
        }
    }
}

#[async_trait]
impl StorageClient for TimedStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<StorageObject>> {
        self.run(StorageOp::Get, key, self.inner.get(key)).await
    }

    async fn head(&self, key: &str) -> StoreResult<Option<Metadata>> {
        self.run(StorageOp::Head, key, self.inner.head(key)).await
    }

    async fn put(&self, key: &str, metadata: Metadata, body: Option<Bytes>) -> StoreResult<()> {
        self.run(StorageOp::Put, key, self.inner.put(key, metadata, body))
            .await
    }

    async fn copy_metadata(&self, key: &str, metadata: Metadata) -> StoreResult<()> {
        self.run(
            StorageOp::CopyMetadata,
            key,
            self.inner.copy_metadata(key, metadata),
        )
        .await
    }

    async fn list(&self, prefix: &str, request: &ListRequest) -> StoreResult<KeyPage> {
        self.run(StorageOp::List, prefix, self.inner.list(prefix, request))
            .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.run(StorageOp::Delete, key, self.inner.delete(key)).await
    }
}

impl std::fmt::Debug for TimedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedStorage")
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStorageClient;

    #[tokio::test]
    async fn passes_through_without_deadline() {
        let inner = Arc::new(InMemoryStorageClient::new());
        let timed = TimedStorage::new(inner.clone(), None);
        timed.put("k", Metadata::new(), None).await.unwrap();
        assert!(timed.head("k").await.unwrap().is_some());
        assert_eq!(inner.calls().put, 1);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let inner = Arc::new(InMemoryStorageClient::new());
        inner.set_latency(Some(Duration::from_millis(200)));
        let timed = TimedStorage::new(inner, Some(Duration::from_millis(10)));

        let err = timed.get("k").await.unwrap_err();
        match err {
            StoreError::Timeout { op, key, after } => {
                assert_eq!(op, StorageOp::Get);
                assert_eq!(key, "k");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fast_call_beats_deadline() {
        let inner = Arc::new(InMemoryStorageClient::new());
        let timed = TimedStorage::new(inner, Some(Duration::from_secs(5)));
        assert!(timed.get("k").await.unwrap().is_none());
    }
}
