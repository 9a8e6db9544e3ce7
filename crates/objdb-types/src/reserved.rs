//! Metadata keys owned by the engine.
//!
//! Field values are stored under compact base-36 keys (`0`, `1`, … `z`,
//! `10`, …), so every reserved key starts with `_` and can never collide with
//! a field key.

/// Schema version active when the object was written.
pub const VERSION: &str = "_v";

/// Present (value `1`) when some fields live in the body.
pub const OVERFLOW: &str = "_ov";

/// Present (value `1`) when values were shortened to fit the budget.
pub const TRUNCATED: &str = "_tr";

/// RFC 3339 timestamp of a soft delete.
pub const DELETED: &str = "_del";

/// Canonical key a partition entry points at.
pub const REFERENCE: &str = "_ref";

/// Field surfaced on decoded records that lost data to truncation.
pub const TRUNCATED_FIELD: &str = "_truncated";

/// Returns `true` for metadata keys reserved by the engine.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with('_')
}
