use serde_json::Value;

use crate::error::TypeError;

/// A document: an ordered map from field name to JSON value.
///
/// `serde_json::Map` is `BTreeMap`-backed, so iteration order is
/// deterministic.
pub type Record = serde_json::Map<String, Value>;

/// Name of the identifying field every record carries.
pub const ID_FIELD: &str = "id";

/// The record's id, if present and a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Convert a JSON value into a [`Record`], failing on non-objects.
pub fn into_record(value: Value) -> Result<Record, TypeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(TypeError::NotAnObject(kind_name(&other).to_string())),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_converts() {
        let rec = into_record(json!({"id": "u1", "n": 1})).unwrap();
        assert_eq!(record_id(&rec), Some("u1"));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = into_record(json!([1, 2])).unwrap_err();
        assert_eq!(err, TypeError::NotAnObject("array".into()));
    }

    #[test]
    fn non_string_id_is_none() {
        let rec = into_record(json!({"id": 7})).unwrap();
        assert_eq!(record_id(&rec), None);
    }
}
