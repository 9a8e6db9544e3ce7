//! Record validation and normalization.

use serde_json::{Map, Number, Value};

use objdb_types::{validate_id, Record, ID_FIELD};

use crate::error::{ValidationError, ValidationErrors};
use crate::field::{Constraint, FieldDef, FieldType};
use crate::schema::{Schema, UnknownFields};

/// Outcome of a validation pass: the normalized record plus every violation.
///
/// The record is only meaningful when `errors` is empty.
#[derive(Clone, Debug)]
pub struct Validated {
    pub record: Record,
    pub errors: Vec<ValidationError>,
}

impl Validated {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Record, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(self.record)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Whole record: defaults applied, required fields enforced.
    Full,
    /// Only the keys present are checked.
    Partial,
}

impl Schema {
    /// Validate and normalize a complete record.
    ///
    /// Values are coerced to their declared types, defaults are applied
    /// before required checks, and nulls count as absent. A missing `id` is
    /// not an error.
    pub fn validate(&self, input: &Record) -> Validated {
        self.run(input, Mode::Full)
    }

    /// Validate only the keys present in `patch`, without defaults or
    /// required checks. Nested objects present in the patch are still
    /// validated in full, since they are always written whole.
    pub fn validate_partial(&self, patch: &Record) -> Validated {
        self.run(patch, Mode::Partial)
    }

    fn run(&self, input: &Record, mode: Mode) -> Validated {
        let mut errors = Vec::new();
        let mut record = Map::new();

        match input.get(ID_FIELD) {
            None | Some(Value::Null) => {}
            Some(value) => {
                if let Some(id) = check_value(self.id_field(), value, ID_FIELD, self.unknown_fields(), &mut errors) {
                    match id.as_str().map(validate_id) {
                        Some(Ok(())) => {
                            record.insert(ID_FIELD.to_string(), id);
                        }
                        Some(Err(e)) => errors.push(ValidationError::new(ID_FIELD, "id", e.to_string())),
                        None => {}
                    }
                }
            }
        }

        let fields = self.fields();
        validate_object(fields, input, "", mode, self.unknown_fields(), &mut record, &mut errors);

        Validated { record, errors }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(
    fields: &[FieldDef],
    input: &Map<String, Value>,
    prefix: &str,
    mode: Mode,
    unknown: UnknownFields,
    out: &mut Map<String, Value>,
    errors: &mut Vec<ValidationError>,
) {
    for key in input.keys() {
        if prefix.is_empty() && key == ID_FIELD {
            continue;
        }
        if key.contains('.') {
            errors.push(ValidationError::new(
                join(prefix, key),
                "dot_path",
                "dot-path updates are not supported; write the whole nested object",
            ));
            continue;
        }
        if !fields.iter().any(|f| &f.name == key) && unknown == UnknownFields::Reject {
            errors.push(ValidationError::new(join(prefix, key), "unknown", "field is not declared in the schema"));
        }
    }

    for def in fields {
        let path = join(prefix, &def.name);
        match input.get(&def.name) {
            None | Some(Value::Null) => {
                if mode == Mode::Partial {
                    continue;
                }
                if let Some(default) = &def.default {
                    out.insert(def.name.clone(), default.clone());
                } else if def.required {
                    errors.push(ValidationError::new(path, "required", "field is required"));
                }
            }
            Some(value) => {
                if let Some(normalized) = check_value(def, value, &path, unknown, errors) {
                    out.insert(def.name.clone(), normalized);
                }
            }
        }
    }
}

/// Coerce `value` to the field's type and check its constraints.
///
/// Returns the normalized value, or `None` after recording errors.
pub(crate) fn check_value(
    def: &FieldDef,
    value: &Value,
    path: &str,
    unknown: UnknownFields,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    let before = errors.len();
    let normalized = coerce(&def.ty, value, path, unknown, errors)?;
    for constraint in &def.constraints {
        check_constraint(constraint, &normalized, path, errors);
    }
    (errors.len() == before).then_some(normalized)
}

fn type_error(path: &str, ty: &FieldType, value: &Value) -> ValidationError {
    ValidationError::new(path, "type", format!("expected {ty}, got {value}"))
}

fn coerce(
    ty: &FieldType,
    value: &Value,
    path: &str,
    unknown: UnknownFields,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    let result = match ty {
        FieldType::String => as_string(value).map(Value::String),
        FieldType::Number => as_number(value).map(Value::Number),
        FieldType::Boolean => as_bool(value).map(Value::Bool),
        FieldType::Any => Some(value.clone()),
        FieldType::Date => match value.as_str() {
            Some(s) if is_date(s) => Some(Value::String(s.to_string())),
            Some(s) => {
                errors.push(ValidationError::new(path, "date", format!("{s:?} is not an RFC 3339 date")));
                return None;
            }
            None => None,
        },
        FieldType::Email => match value.as_str() {
            Some(s) if is_email(s) => Some(Value::String(s.to_string())),
            Some(s) => {
                errors.push(ValidationError::new(path, "email", format!("{s:?} is not an email address")));
                return None;
            }
            None => None,
        },
        FieldType::Enum(allowed) => match as_string(value) {
            Some(s) if allowed.contains(&s) => Some(Value::String(s)),
            Some(s) => {
                errors.push(ValidationError::new(
                    path,
                    "enum",
                    format!("{s:?} is not one of {}", allowed.join(", ")),
                ));
                return None;
            }
            None => None,
        },
        FieldType::Array(item) => match value.as_array() {
            Some(items) => {
                let before = errors.len();
                let mut out = Vec::with_capacity(items.len());
                for (i, element) in items.iter().enumerate() {
                    let element_path = format!("{path}[{i}]");
                    if let Some(v) = coerce(item, element, &element_path, unknown, errors) {
                        out.push(v);
                    }
                }
                if errors.len() != before {
                    return None;
                }
                Some(Value::Array(out))
            }
            None => None,
        },
        FieldType::Object(children) => match value.as_object() {
            Some(_) if children.is_empty() => Some(value.clone()),
            Some(map) => {
                let before = errors.len();
                let mut out = Map::new();
                validate_object(children, map, path, Mode::Full, unknown, &mut out, errors);
                if errors.len() != before {
                    return None;
                }
                Some(Value::Object(out))
            }
            None => None,
        },
    };

    if result.is_none() {
        errors.push(type_error(path, ty, value));
    }
    result
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => parse_number(s.trim()),
        _ => None,
    }
}

/// Parse a numeric string, preferring an integer representation.
fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    let f = s.parse::<f64>().ok()?;
    Number::from_f64(f)
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn is_date(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

fn check_constraint(constraint: &Constraint, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let rule = constraint.rule();
    let message = match constraint {
        Constraint::MinLength(min) => length_of(value)
            .filter(|len| len < min)
            .map(|len| format!("length {len} is below the minimum of {min}")),
        Constraint::MaxLength(max) => length_of(value)
            .filter(|len| len > max)
            .map(|len| format!("length {len} exceeds the maximum of {max}")),
        Constraint::Min(min) => value
            .as_f64()
            .filter(|n| n < min)
            .map(|n| format!("{n} is below the minimum of {min}")),
        Constraint::Max(max) => value
            .as_f64()
            .filter(|n| n > max)
            .map(|n| format!("{n} exceeds the maximum of {max}")),
        Constraint::Integer => value
            .as_f64()
            .filter(|n| n.fract() != 0.0)
            .map(|n| format!("{n} is not an integer")),
        Constraint::Pattern(re) => value
            .as_str()
            .filter(|s| !re.is_match(s))
            .map(|s| format!("{s:?} does not match {}", re.as_str())),
    };
    if let Some(message) = message {
        errors.push(ValidationError::new(path, rule, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        objdb_types::into_record(value).unwrap()
    }

    fn user_schema() -> Schema {
        Schema::builder()
            .field("name", "string|required|minlength:2")
            .field("age", "number|integer|min:0")
            .field("active", "boolean|default:true")
            .field("status", "enum:pending,active|default:pending")
            .field("tags", "array|items:string|max:3")
            .field("email", "email")
            .object(
                "address",
                "object",
                Schema::builder()
                    .field("city", "string|required")
                    .field("zip", "string"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn applies_defaults_and_coerces() {
        let out = user_schema()
            .validate(&rec(json!({"id": "u1", "name": "Ada", "age": "36"})))
            .into_result()
            .unwrap();
        assert_eq!(out["id"], json!("u1"));
        assert_eq!(out["age"], json!(36));
        assert_eq!(out["active"], json!(true));
        assert_eq!(out["status"], json!("pending"));
        assert!(!out.contains_key("tags"));
    }

    #[test]
    fn collects_every_error() {
        let result = user_schema().validate(&rec(json!({
            "age": -1.5,
            "status": "deleted",
            "tags": ["a", "b", "c", "d"],
            "email": "not-an-email",
            "extra": 1
        })));
        let errors = result.into_result().unwrap_err();
        assert!(errors.has("name", "required"));
        assert!(errors.has("age", "integer"));
        assert!(errors.has("age", "min"));
        assert!(errors.has("status", "enum"));
        assert!(errors.has("tags", "maxlength"));
        assert!(errors.has("email", "email"));
        assert!(errors.has("extra", "unknown"));
        assert_eq!(errors.len(), 7);
    }

    #[test]
    fn type_errors_name_the_path() {
        let errors = user_schema()
            .validate(&rec(json!({"name": "Ada", "tags": ["ok", {"no": 1}]})))
            .into_result()
            .unwrap_err();
        assert!(errors.has("tags[1]", "type"));
    }

    #[test]
    fn nested_objects_are_validated_whole() {
        let errors = user_schema()
            .validate(&rec(json!({"name": "Ada", "address": {"zip": "123"}})))
            .into_result()
            .unwrap_err();
        assert!(errors.has("address.city", "required"));
    }

    #[test]
    fn dot_paths_are_rejected() {
        let result = user_schema().validate_partial(&rec(json!({"address.city": "Paris"})));
        let errors = result.into_result().unwrap_err();
        assert!(errors.has("address.city", "dot_path"));
    }

    #[test]
    fn partial_skips_required_and_defaults() {
        let out = user_schema()
            .validate_partial(&rec(json!({"age": 7})))
            .into_result()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["age"], json!(7));
    }

    #[test]
    fn nulls_count_as_absent() {
        let out = user_schema()
            .validate(&rec(json!({"name": "Ada", "age": null, "active": null})))
            .into_result()
            .unwrap();
        assert!(!out.contains_key("age"));
        assert_eq!(out["active"], json!(true));
    }

    #[test]
    fn unknown_fields_can_be_dropped() {
        let schema = Schema::builder()
            .field("name", "string")
            .unknown_fields(UnknownFields::Drop)
            .build()
            .unwrap();
        let out = schema
            .validate(&rec(json!({"name": "x", "junk": true})))
            .into_result()
            .unwrap();
        assert!(!out.contains_key("junk"));
    }

    #[test]
    fn invalid_ids_are_reported() {
        let errors = user_schema()
            .validate(&rec(json!({"id": "a/b", "name": "Ada"})))
            .into_result()
            .unwrap_err();
        assert!(errors.has("id", "id"));
    }

    #[test]
    fn numeric_ids_become_strings() {
        let out = user_schema()
            .validate(&rec(json!({"id": 42, "name": "Ada"})))
            .into_result()
            .unwrap();
        assert_eq!(out["id"], json!("42"));
    }

    #[test]
    fn boolean_coercion() {
        let schema = Schema::builder().field("flag", "boolean").build().unwrap();
        for (input, expected) in [(json!("true"), true), (json!("0"), false), (json!(1), true)] {
            let out = schema
                .validate(&rec(json!({ "flag": input })))
                .into_result()
                .unwrap();
            assert_eq!(out["flag"], json!(expected));
        }
        assert!(!schema.validate(&rec(json!({"flag": "maybe"}))).is_valid());
    }

    #[test]
    fn dates_accept_rfc3339_and_plain_days() {
        let schema = Schema::builder().field("at", "date").build().unwrap();
        assert!(schema.validate(&rec(json!({"at": "2024-05-01T10:00:00Z"}))).is_valid());
        assert!(schema.validate(&rec(json!({"at": "2024-05-01"}))).is_valid());
        let errors = schema
            .validate(&rec(json!({"at": "yesterday"})))
            .into_result()
            .unwrap_err();
        assert!(errors.has("at", "date"));
    }

    #[test]
    fn free_form_objects_pass_through() {
        let schema = Schema::builder().field("meta", "object").build().unwrap();
        let out = schema
            .validate(&rec(json!({"meta": {"anything": [1, 2]}})))
            .into_result()
            .unwrap();
        assert_eq!(out["meta"], json!({"anything": [1, 2]}));
    }

    #[test]
    fn pattern_constraint() {
        let schema = Schema::builder()
            .field("sku", "string|pattern:^[A-Z]{3}-[0-9]+$")
            .build()
            .unwrap();
        assert!(schema.validate(&rec(json!({"sku": "ABC-12"}))).is_valid());
        let errors = schema
            .validate(&rec(json!({"sku": "abc"})))
            .into_result()
            .unwrap_err();
        assert!(errors.has("sku", "pattern"));
    }
}
