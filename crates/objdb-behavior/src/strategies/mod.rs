//! Built-in behavior strategies.

pub mod body_only;
pub mod enforce;
pub mod overflow;
pub mod truncate;

pub use body_only::BodyOnly;
pub use enforce::EnforceLimits;
pub use overflow::BodyOverflow;
pub use truncate::TruncateData;

#[cfg(test)]
pub(crate) mod fixtures {
    use objdb_schema::Schema;
    use objdb_types::Record;
    use serde_json::Value;

    use crate::behavior::EncodeContext;
    use crate::codec::FieldCodec;

    pub fn schema() -> Schema {
        Schema::builder()
            .field("title", "string|required")
            .field("count", "number")
            .field("notes", "string")
            .field("tags", "array|items:string")
            .field("meta", "object")
            .build()
            .unwrap()
    }

    pub fn codec() -> FieldCodec {
        FieldCodec::new(&schema())
    }

    pub fn ctx(budget: usize) -> EncodeContext<'static> {
        EncodeContext {
            resource: "docs",
            id: "d1",
            budget,
            version: 1,
        }
    }

    pub fn rec(value: Value) -> Record {
        objdb_types::into_record(value).unwrap()
    }
}
