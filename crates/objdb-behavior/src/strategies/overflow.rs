use serde_json::Map;

use objdb_types::metadata::entry_size;
use objdb_types::{reserved, Record};

use crate::behavior::{all_in_metadata, base_metadata, encode_body, Behavior, BehaviorKind, EncodeContext, Encoded};
use crate::codec::FieldCodec;
use crate::error::BehaviorResult;

/// Metadata first, body for whatever does not fit.
///
/// Fields are packed first-fit in serialization order; a field too large for
/// the remaining budget goes to the body and packing continues with the next
/// one. When anything spills, the overflow marker is set and the spilled
/// fields are written to the body as a JSON object.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyOverflow;

impl Behavior for BodyOverflow {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::BodyOverflow
    }

    fn encode(
        &self,
        codec: &FieldCodec,
        ctx: &EncodeContext<'_>,
        record: &Record,
    ) -> BehaviorResult<Encoded> {
        let everything = all_in_metadata(codec, ctx, record);
        if everything.byte_size() <= ctx.budget {
            return Ok(Encoded {
                metadata: everything,
                body: None,
                truncated: false,
            });
        }

        let mut metadata = base_metadata(ctx);
        let marker = entry_size(reserved::OVERFLOW, "1");
        let mut used = metadata.byte_size() + marker;
        let mut spilled = Map::new();

        for (entry, value, encoded) in codec.encode_fields(record) {
            let size = entry_size(&entry.key, &encoded);
            if used + size <= ctx.budget {
                used += size;
                metadata.insert(entry.key.clone(), encoded);
            } else {
                spilled.insert(entry.name.clone(), value.clone());
            }
        }

        metadata.insert(reserved::OVERFLOW, "1");
        tracing::debug!(
            resource = ctx.resource,
            id = ctx.id,
            spilled = spilled.len(),
            "record overflowed metadata into body"
        );

        Ok(Encoded {
            metadata,
            body: Some(encode_body(&spilled)?),
            truncated: false,
        })
    }

    fn metadata_only(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::{codec, ctx, rec};
    use serde_json::json;

    #[test]
    fn small_records_stay_in_metadata() {
        let codec = codec();
        let record = rec(json!({"id": "d1", "title": "short"}));
        let encoded = BodyOverflow.encode(&codec, &ctx(2048), &record).unwrap();
        assert!(encoded.body.is_none());
        assert!(!encoded.metadata.contains_key("_ov"));
        assert!(!BodyOverflow.needs_body(&encoded.metadata));
    }

    #[test]
    fn large_fields_spill_to_body() {
        let codec = codec();
        let record = rec(json!({
            "id": "d1",
            "title": "t",
            "notes": "n".repeat(500),
            "count": 7
        }));
        let encoded = BodyOverflow.encode(&codec, &ctx(64), &record).unwrap();

        assert!(encoded.metadata.byte_size() <= 64);
        assert_eq!(encoded.metadata.get("_ov"), Some("1"));
        // title (key 0) and count (key 1) fit, notes (key 2) spilled.
        assert_eq!(encoded.metadata.get("0"), Some("t"));
        assert_eq!(encoded.metadata.get("1"), Some("7"));
        assert!(!encoded.metadata.contains_key("2"));

        let body = encoded.body.clone().expect("body expected");
        let spilled: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(spilled, json!({"notes": "n".repeat(500)}));

        assert!(BodyOverflow.needs_body(&encoded.metadata));
        let decoded = BodyOverflow
            .decode(&codec, "d1", &encoded.metadata, Some(&body))
            .unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn missing_body_is_corrupt() {
        let codec = codec();
        let record = rec(json!({"title": "x".repeat(300)}));
        let encoded = BodyOverflow.encode(&codec, &ctx(64), &record).unwrap();
        assert!(BodyOverflow
            .decode(&codec, "d1", &encoded.metadata, None)
            .is_err());
    }
}
