use bytes::Bytes;

use crate::metadata::Metadata;

/// The physical unit of storage: a metadata map and an optional body.
///
/// The key is not part of the object; callers always address objects by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageObject {
    pub metadata: Metadata,
    pub body: Option<Bytes>,
}

impl StorageObject {
    pub fn new(metadata: Metadata, body: Option<Bytes>) -> Self {
        Self { metadata, body }
    }

    /// Body length in bytes (zero when absent).
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }
}
