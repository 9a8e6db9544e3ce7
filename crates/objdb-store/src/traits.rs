use async_trait::async_trait;
use bytes::Bytes;
use objdb_types::{Metadata, StorageObject};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// The six request kinds a storage client serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageOp {
    Get,
    Head,
    Put,
    CopyMetadata,
    List,
    Delete,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Head => write!(f, "head"),
            Self::Put => write!(f, "put"),
            Self::CopyMetadata => write!(f, "copy_metadata"),
            Self::List => write!(f, "list"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Pagination for a `list` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys strictly greater than this are returned.
    pub start_after: Option<String>,
    /// Page size; `None` returns every matching key.
    pub max_keys: Option<usize>,
}

impl ListRequest {
    /// List everything under the prefix in one page.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(start_after: Option<String>, max_keys: usize) -> Self {
        Self {
            start_after,
            max_keys: Some(max_keys),
        }
    }
}

/// One page of keys, in ascending order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` when the listing is exhausted.
    pub next_start_after: Option<String>,
}

/// Uniform interface over an object-storage backend.
///
/// All implementations must satisfy these invariants:
/// - `put` and `copy_metadata` are atomic per key.
/// - Reads observe every write that completed before them.
/// - `copy_metadata` replaces the metadata of an existing object without
///   transferring its body, and fails with `NotFound` if the key is absent.
/// - `delete` of a missing key succeeds.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetch metadata and body. `Ok(None)` if the object does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<StorageObject>>;

    /// Fetch metadata only. `Ok(None)` if the object does not exist.
    async fn head(&self, key: &str) -> StoreResult<Option<Metadata>>;

    /// Create or overwrite an object.
    async fn put(&self, key: &str, metadata: Metadata, body: Option<Bytes>) -> StoreResult<()>;

    /// Rewrite the metadata of an existing object in place.
    async fn copy_metadata(&self, key: &str, metadata: Metadata) -> StoreResult<()>;

    /// List keys under `prefix` in ascending order.
    async fn list(&self, prefix: &str, request: &ListRequest) -> StoreResult<KeyPage>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Collect every key under `prefix`, following pagination cursors.
    async fn list_all(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut request = ListRequest::all();
        loop {
            let page = self.list(prefix, &request).await?;
            keys.extend(page.keys);
            match page.next_start_after {
                Some(cursor) => request.start_after = Some(cursor),
                None => return Ok(keys),
            }
        }
    }
}
