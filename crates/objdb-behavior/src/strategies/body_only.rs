use serde_json::{Map, Value};

use objdb_types::{reserved, Record, ID_FIELD};

use crate::behavior::{base_metadata, encode_body, Behavior, BehaviorKind, EncodeContext, Encoded};
use crate::codec::FieldCodec;
use crate::error::BehaviorResult;

/// Every field in the body; metadata carries only reserved keys.
///
/// Suited to large documents where the metadata budget would always be
/// exceeded anyway.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyOnly;

impl Behavior for BodyOnly {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::BodyOnly
    }

    fn encode(
        &self,
        _codec: &FieldCodec,
        ctx: &EncodeContext<'_>,
        record: &Record,
    ) -> BehaviorResult<Encoded> {
        let mut metadata = base_metadata(ctx);
        metadata.insert(reserved::OVERFLOW, "1");

        let fields: Map<String, Value> = record
            .iter()
            .filter(|(name, value)| name.as_str() != ID_FIELD && !value.is_null())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Encoded {
            metadata,
            body: Some(encode_body(&fields)?),
            truncated: false,
        })
    }

    fn metadata_only(&self) -> bool {
        false
    }
}
