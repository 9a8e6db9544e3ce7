//! Record identifier rules.
//!
//! Ids become a key segment (`id=<id>`), so they are restricted to what can
//! be embedded in an object key without escaping:
//! - Must be non-empty and at most [`MAX_ID_LEN`] bytes
//! - Must not contain `/`
//! - Must not contain control characters

use crate::error::TypeError;

/// Longest id accepted, in bytes.
pub const MAX_ID_LEN: usize = 255;

/// Validate a record id, returning `Ok(())` if it can be used in a key.
///
/// # Examples
///
/// ```
/// use objdb_types::validate_id;
///
/// assert!(validate_id("user-1").is_ok());
/// assert!(validate_id("").is_err());
/// assert!(validate_id("a/b").is_err());
/// ```
pub fn validate_id(id: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidId {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("id must not be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(invalid("id is longer than 255 bytes"));
    }
    if id.contains('/') {
        return Err(invalid("id must not contain '/'"));
    }
    if id.chars().any(char::is_control) {
        return Err(invalid("id must not contain control characters"));
    }
    Ok(())
}
