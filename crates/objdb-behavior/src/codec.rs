//! Per-field value encoding shared by every behavior.
//!
//! Field names are mapped to compact metadata keys: the base-36 position of
//! the field in the schema's serialization order (`0`, `1`, ... `z`, `10`).
//! Values are encoded so that metadata stays printable US-ASCII:
//!
//! - strings of printable ASCII that do not start with `"` are stored raw
//! - every other string is stored as a JSON string literal with non-ASCII
//!   characters escaped as `\uXXXX`
//! - non-string values are stored as JSON, escaped the same way

use serde_json::Value;

use objdb_schema::{Constraint, Schema};
use objdb_types::{Record, ID_FIELD};

use crate::error::{BehaviorError, BehaviorResult};

/// Codec metadata for one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecEntry {
    pub name: String,
    /// Compact metadata key.
    pub key: String,
    /// Decoded as a string when stored raw.
    pub string_like: bool,
    /// May be shortened by the truncating strategy. Pattern-constrained
    /// strings never are.
    pub truncatable: bool,
    /// Shortest length truncation may leave, from a `minlength` constraint.
    pub min_length: usize,
    pub required: bool,
}

/// Bidirectional field codec derived from a schema.
#[derive(Clone, Debug)]
pub struct FieldCodec {
    entries: Vec<CodecEntry>,
}

impl FieldCodec {
    /// Derive the codec from the schema's deterministic field order.
    ///
    /// The `id` is carried by the object key and never encoded.
    pub fn new(schema: &Schema) -> Self {
        let entries = schema
            .field_order()
            .into_iter()
            .filter(|name| *name != ID_FIELD)
            .enumerate()
            .filter_map(|(position, name)| {
                let def = schema.field(name)?;
                Some(CodecEntry {
                    name: name.to_string(),
                    key: base36(position),
                    string_like: def.ty.is_string_like(),
                    truncatable: def.ty.is_truncatable()
                        && !def.constraints.iter().any(|c| matches!(c, Constraint::Pattern(_))),
                    min_length: def
                        .constraints
                        .iter()
                        .filter_map(|c| match c {
                            Constraint::MinLength(n) => Some(*n),
                            _ => None,
                        })
                        .max()
                        .unwrap_or(0),
                    required: def.required,
                })
            })
            .collect();
        Self { entries }
    }

    /// Entries in serialization order.
    pub fn entries(&self) -> &[CodecEntry] {
        &self.entries
    }

    pub fn by_name(&self, name: &str) -> Option<&CodecEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn by_key(&self, key: &str) -> Option<&CodecEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Present fields of `record` in serialization order, with their
    /// encoded values.
    pub fn encode_fields<'a>(&'a self, record: &'a Record) -> Vec<(&'a CodecEntry, &'a Value, String)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let value = record.get(&entry.name)?;
                if value.is_null() {
                    return None;
                }
                Some((entry, value, encode_value(entry, value)))
            })
            .collect()
    }
}

/// Encode a single value for metadata.
pub fn encode_value(entry: &CodecEntry, value: &Value) -> String {
    match value {
        Value::String(s) if entry.string_like && is_raw_safe(s) => s.clone(),
        other => to_ascii_json(other),
    }
}

/// Decode a single metadata value.
pub fn decode_value(entry: &CodecEntry, raw: &str) -> BehaviorResult<Value> {
    if entry.string_like && !raw.starts_with('"') {
        return Ok(Value::String(raw.to_string()));
    }
    serde_json::from_str(raw).map_err(|e| BehaviorError::Corrupt {
        field: entry.name.clone(),
        reason: e.to_string(),
    })
}

fn is_raw_safe(s: &str) -> bool {
    !s.starts_with('"') && s.bytes().all(|b| (0x20..0x7f).contains(&b))
}

/// JSON text with every character outside printable ASCII escaped.
pub fn to_ascii_json(value: &Value) -> String {
    let json = value.to_string();
    if json.is_ascii() && !json.contains('\u{7f}') {
        return json;
    }
    let mut out = String::with_capacity(json.len() + 16);
    let mut units = [0u16; 2];
    for ch in json.chars() {
        if ch.is_ascii() && ch != '\u{7f}' {
            out.push(ch);
        } else {
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

fn base36(mut n: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[n % 36]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// Length in the units truncation removes: chars for strings, items for
/// arrays.
pub(crate) fn truncatable_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

/// Whether truncation may shorten `value` without breaking its constraints.
pub(crate) fn can_shorten(entry: &CodecEntry, value: &Value) -> bool {
    entry.truncatable && truncatable_len(value).is_some_and(|len| len > entry.min_length)
}
