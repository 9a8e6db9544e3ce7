use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use objdb_types::{reserved, Metadata, Record, ID_FIELD};

use crate::codec::{decode_value, FieldCodec};
use crate::error::{BehaviorError, BehaviorResult};
use crate::strategies::{BodyOnly, BodyOverflow, EnforceLimits, TruncateData};

/// Metadata budget of S3-compatible stores, in bytes.
pub const DEFAULT_METADATA_BUDGET: usize = 2048;

/// Selectable behavior, as written in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorKind {
    EnforceLimits,
    #[default]
    BodyOverflow,
    TruncateData,
    BodyOnly,
}

impl BehaviorKind {
    /// Instantiate the strategy.
    pub fn strategy(self) -> Arc<dyn Behavior> {
        match self {
            Self::EnforceLimits => Arc::new(EnforceLimits),
            Self::BodyOverflow => Arc::new(BodyOverflow),
            Self::TruncateData => Arc::new(TruncateData),
            Self::BodyOnly => Arc::new(BodyOnly),
        }
    }
}

impl std::fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnforceLimits => write!(f, "enforce-limits"),
            Self::BodyOverflow => write!(f, "body-overflow"),
            Self::TruncateData => write!(f, "truncate-data"),
            Self::BodyOnly => write!(f, "body-only"),
        }
    }
}

/// What a strategy needs to know about the write besides the record.
#[derive(Clone, Copy, Debug)]
pub struct EncodeContext<'a> {
    pub resource: &'a str,
    pub id: &'a str,
    pub budget: usize,
    pub version: u32,
}

/// A record split into metadata and body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    pub metadata: Metadata,
    pub body: Option<Bytes>,
    /// Values were shortened or dropped to fit.
    pub truncated: bool,
}

/// A strategy for splitting records between metadata and body.
///
/// Strategies are stateless and shared behind `Arc<dyn Behavior>`. Decoding
/// is common to all of them: fields come from metadata, and from the body
/// when the overflow marker is present.
pub trait Behavior: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BehaviorKind;

    /// Split `record` into metadata and body, honoring `ctx.budget`.
    ///
    /// The record's `id` is never encoded; it lives in the object key.
    fn encode(
        &self,
        codec: &FieldCodec,
        ctx: &EncodeContext<'_>,
        record: &Record,
    ) -> BehaviorResult<Encoded>;

    /// `true` if every write keeps all fields in metadata, so that reads and
    /// rewrites never need the body.
    fn metadata_only(&self) -> bool;

    /// Whether reconstructing a record from `metadata` requires the body.
    fn needs_body(&self, metadata: &Metadata) -> bool {
        metadata.contains_key(reserved::OVERFLOW)
    }

    /// Rebuild the record stored under `id`.
    fn decode(
        &self,
        codec: &FieldCodec,
        id: &str,
        metadata: &Metadata,
        body: Option<&[u8]>,
    ) -> BehaviorResult<Record> {
        let mut record = Map::new();
        record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

        for (key, raw) in metadata.iter() {
            if reserved::is_reserved_key(key) {
                continue;
            }
            match codec.by_key(key) {
                Some(entry) => {
                    record.insert(entry.name.clone(), decode_value(entry, raw)?);
                }
                None => tracing::trace!(key, "ignoring metadata key unknown to the schema"),
            }
        }

        if self.needs_body(metadata) {
            let body = body.ok_or_else(|| BehaviorError::Corrupt {
                field: reserved::OVERFLOW.into(),
                reason: "overflow marker set but no body was read".into(),
            })?;
            let spilled: Map<String, Value> =
                serde_json::from_slice(body).map_err(|e| BehaviorError::Corrupt {
                    field: "<body>".into(),
                    reason: e.to_string(),
                })?;
            record.extend(spilled);
        }

        if metadata.contains_key(reserved::TRUNCATED) {
            record.insert(reserved::TRUNCATED_FIELD.to_string(), Value::Bool(true));
        }
        Ok(record)
    }
}

/// Metadata holding only the schema version.
pub(crate) fn base_metadata(ctx: &EncodeContext<'_>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(reserved::VERSION, ctx.version.to_string());
    metadata
}

/// Serialize spilled fields as the JSON body.
pub(crate) fn encode_body(fields: &Map<String, Value>) -> BehaviorResult<Bytes> {
    serde_json::to_vec(fields)
        .map(Bytes::from)
        .map_err(|e| BehaviorError::Serialization(e.to_string()))
}

/// Every present field in metadata, plus the version key.
pub(crate) fn all_in_metadata(
    codec: &FieldCodec,
    ctx: &EncodeContext<'_>,
    record: &Record,
) -> Metadata {
    let mut metadata = base_metadata(ctx);
    for (entry, _, encoded) in codec.encode_fields(record) {
        metadata.insert(entry.key.clone(), encoded);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serde_names() {
        let kind: BehaviorKind = serde_json::from_str("\"enforce-limits\"").unwrap();
        assert_eq!(kind, BehaviorKind::EnforceLimits);
        assert_eq!(BehaviorKind::default(), BehaviorKind::BodyOverflow);
        assert_eq!(BehaviorKind::TruncateData.to_string(), "truncate-data");
    }

    #[test]
    fn strategies_report_their_kind() {
        for kind in [
            BehaviorKind::EnforceLimits,
            BehaviorKind::BodyOverflow,
            BehaviorKind::TruncateData,
            BehaviorKind::BodyOnly,
        ] {
            assert_eq!(kind.strategy().kind(), kind);
        }
    }

    #[test]
    fn metadata_only_strategies() {
        assert!(BehaviorKind::EnforceLimits.strategy().metadata_only());
        assert!(BehaviorKind::TruncateData.strategy().metadata_only());
        assert!(!BehaviorKind::BodyOverflow.strategy().metadata_only());
        assert!(!BehaviorKind::BodyOnly.strategy().metadata_only());
    }
}
