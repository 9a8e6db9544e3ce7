use serde_json::Value;

use objdb_types::metadata::entry_size;
use objdb_types::{reserved, Metadata, Record};

use crate::behavior::{all_in_metadata, Behavior, BehaviorKind, EncodeContext, Encoded};
use crate::codec::{can_shorten, FieldCodec};
use crate::error::{BehaviorError, BehaviorResult};

/// Everything in metadata; oversized records are shortened until they fit.
///
/// Each round shortens the longest truncatable value (a string or an array)
/// by an amount proportional to the remaining excess, never below the
/// field's `minlength`. Strings with a `pattern` are never shortened. When
/// nothing is left to shorten, the largest optional field is dropped. Records
/// that still do not fit once only required, unshortenable values remain are
/// refused, so whatever is stored still satisfies the schema.
///
/// Stored objects carry the truncation marker and decode with
/// `_truncated: true`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TruncateData;

impl Behavior for TruncateData {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::TruncateData
    }

    fn encode(
        &self,
        codec: &FieldCodec,
        ctx: &EncodeContext<'_>,
        record: &Record,
    ) -> BehaviorResult<Encoded> {
        let mut working = record.clone();
        let mut truncated = false;

        loop {
            let metadata = measure(codec, ctx, &working, truncated);
            let size = metadata.byte_size();
            if size <= ctx.budget {
                if truncated {
                    tracing::debug!(resource = ctx.resource, id = ctx.id, "record truncated to fit metadata");
                }
                return Ok(Encoded {
                    metadata,
                    body: None,
                    truncated,
                });
            }
            let over = size - ctx.budget;
            let encoded = codec.encode_fields(&working);

            let longest = encoded
                .iter()
                .filter(|(entry, value, _)| can_shorten(entry, value))
                .max_by_key(|(_, _, text)| text.len())
                .map(|(entry, _, text)| ((*entry).clone(), text.len()));

            if let Some((entry, encoded_len)) = longest {
                if let Some(value) = working.get_mut(&entry.name) {
                    shorten(value, over, encoded_len, entry.min_length);
                }
                truncated = true;
                continue;
            }

            let droppable = encoded
                .iter()
                .filter(|(entry, _, _)| !entry.required)
                .max_by_key(|(entry, _, text)| entry_size(&entry.key, text))
                .map(|(entry, _, _)| entry.name.clone());

            match droppable {
                Some(name) => {
                    working.remove(&name);
                    truncated = true;
                }
                None => {
                    return Err(BehaviorError::SizeLimitExceeded {
                        resource: ctx.resource.to_string(),
                        id: ctx.id.to_string(),
                        bytes_over: over,
                    })
                }
            }
        }
    }

    fn metadata_only(&self) -> bool {
        true
    }
}

fn measure(codec: &FieldCodec, ctx: &EncodeContext<'_>, record: &Record, truncated: bool) -> Metadata {
    let mut metadata = all_in_metadata(codec, ctx, record);
    if truncated {
        metadata.insert(reserved::TRUNCATED, "1");
    }
    metadata
}

/// Drop units from the end of `value` in proportion to `over / encoded_len`,
/// at least one and never leaving fewer than `floor`. Callers ensure the
/// value is longer than `floor`.
fn shorten(value: &mut Value, over: usize, encoded_len: usize, floor: usize) {
    let drop_count = |len: usize| -> usize {
        let proportional = (over * len).div_ceil(encoded_len.max(1));
        proportional.clamp(1, len.saturating_sub(floor).max(1))
    };
    match value {
        Value::String(s) => {
            let len = s.chars().count();
            let keep = len - drop_count(len);
            *s = s.chars().take(keep).collect();
        }
        Value::Array(items) => {
            let len = items.len();
            items.truncate(len - drop_count(len));
        }
        _ => {}
    }
}
