use objdb_types::Record;

use crate::behavior::{all_in_metadata, Behavior, BehaviorKind, EncodeContext, Encoded};
use crate::codec::FieldCodec;
use crate::error::{BehaviorError, BehaviorResult};

/// Everything in metadata; a record over budget is refused.
///
/// Reads never need the body, and nothing is ever silently lost.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnforceLimits;

impl Behavior for EnforceLimits {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::EnforceLimits
    }

    fn encode(
        &self,
        codec: &FieldCodec,
        ctx: &EncodeContext<'_>,
        record: &Record,
    ) -> BehaviorResult<Encoded> {
        let metadata = all_in_metadata(codec, ctx, record);
        let size = metadata.byte_size();
        if size > ctx.budget {
            return Err(BehaviorError::SizeLimitExceeded {
                resource: ctx.resource.to_string(),
                id: ctx.id.to_string(),
                bytes_over: size - ctx.budget,
            });
        }
        Ok(Encoded {
            metadata,
            body: None,
            truncated: false,
        })
    }

    fn metadata_only(&self) -> bool {
        true
    }
}
