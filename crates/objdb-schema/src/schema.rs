use serde::{Deserialize, Serialize};
use serde_json::Value;

use objdb_types::ID_FIELD;

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDef, FieldType};
use crate::rule::parse_rule;
use crate::validate::check_value;

/// What to do with input keys the schema does not declare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFields {
    /// Report each unknown key as a validation error.
    #[default]
    Reject,
    /// Silently drop unknown keys.
    Drop,
}

/// Immutable, ordered field list of a resource.
///
/// The `id` field is implicit: it is always a string, always first in
/// [`Schema::field_order`], and never required (the engine assigns one when
/// it is missing). Declaring `id` explicitly only adds constraints to it.
#[derive(Clone, Debug)]
pub struct Schema {
    id: FieldDef,
    fields: Vec<FieldDef>,
    unknown: UnknownFields,
    version: u32,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a schema from a JSON attribute map.
    ///
    /// Each entry is either a rule string or a nested object whose entries
    /// are themselves attributes. A nested object may carry a `$$type` rule
    /// (`"object|required"`); without one it is optional. Fields are declared
    /// in the map's key order.
    pub fn from_attributes(attributes: &Value) -> SchemaResult<Self> {
        let map = attributes
            .as_object()
            .ok_or_else(|| SchemaError::InvalidAttribute {
                field: "<root>".into(),
                reason: "attributes must be an object".into(),
            })?;
        let mut builder = Self::builder();
        for def in parse_attributes(map)? {
            builder = builder.def(def);
        }
        builder.build()
    }

    /// Declared fields, excluding the implicit `id`.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Definition of the `id` field.
    pub fn id_field(&self) -> &FieldDef {
        &self.id
    }

    /// Top-level field by name, including `id`.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        if name == ID_FIELD {
            return Some(&self.id);
        }
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field addressed by a dot path into nested objects (`address.city`).
    pub fn lookup(&self, path: &str) -> Option<&FieldDef> {
        let mut parts = path.split('.');
        let mut current = self.field(parts.next()?)?;
        for part in parts {
            current = current.children()?.iter().find(|f| f.name == part)?;
        }
        Some(current)
    }

    /// Deterministic serialization order: `id`, then declaration order.
    pub fn field_order(&self) -> Vec<&str> {
        std::iter::once(ID_FIELD)
            .chain(self.fields.iter().map(|f| f.name.as_str()))
            .collect()
    }

    pub fn unknown_fields(&self) -> UnknownFields {
        self.unknown
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// A copy of this schema with a different unknown-field policy.
    pub fn with_unknown_fields(&self, policy: UnknownFields) -> Self {
        Self {
            unknown: policy,
            ..self.clone()
        }
    }

    /// A copy of this schema with `extra` fields appended, skipping any that
    /// are already declared.
    pub fn with_extra_fields(&self, extra: Vec<FieldDef>) -> SchemaResult<Self> {
        let mut schema = self.clone();
        for def in extra {
            if schema.field(&def.name).is_none() {
                validate_def(&def)?;
                schema.fields.push(def);
            }
        }
        Ok(schema)
    }
}

/// Incremental schema construction. Errors are deferred to [`build`].
///
/// [`build`]: SchemaBuilder::build
#[derive(Debug)]
pub struct SchemaBuilder {
    defs: Vec<FieldDef>,
    errors: Vec<SchemaError>,
    unknown: UnknownFields,
    version: u32,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self {
            defs: Vec::new(),
            errors: Vec::new(),
            unknown: UnknownFields::Reject,
            version: 1,
        }
    }
}

impl SchemaBuilder {
    /// Declare a field from a rule string.
    pub fn field(mut self, name: &str, rule: &str) -> Self {
        match parse_rule(name, rule) {
            Ok(def) => self.defs.push(def),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Declare a nested object field. `rule` is `object` plus modifiers.
    pub fn object(mut self, name: &str, rule: &str, nested: SchemaBuilder) -> Self {
        let mut def = match parse_rule(name, rule) {
            Ok(def) => def,
            Err(e) => {
                self.errors.push(e);
                return self;
            }
        };
        if !matches!(def.ty, FieldType::Object(_)) {
            self.errors.push(SchemaError::InvalidRule {
                field: name.into(),
                rule: rule.into(),
                reason: "nested fields require the object type".into(),
            });
            return self;
        }
        self.errors.extend(nested.errors);
        def.ty = FieldType::Object(nested.defs);
        self.defs.push(def);
        self
    }

    /// Declare a pre-built field definition.
    pub fn def(mut self, def: FieldDef) -> Self {
        self.defs.push(def);
        self
    }

    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.unknown = policy;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn build(self) -> SchemaResult<Schema> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let mut id = FieldDef::new(ID_FIELD, FieldType::String);
        let mut fields: Vec<FieldDef> = Vec::with_capacity(self.defs.len());

        for def in self.defs {
            if def.name == ID_FIELD {
                if !matches!(def.ty, FieldType::String) {
                    return Err(SchemaError::InvalidRule {
                        field: ID_FIELD.into(),
                        rule: def.ty.name().into(),
                        reason: "id must be a string".into(),
                    });
                }
                id.constraints = def.constraints;
                continue;
            }
            validate_def(&def)?;
            if fields.iter().any(|f| f.name == def.name) {
                return Err(SchemaError::DuplicateField(def.name));
            }
            fields.push(def);
        }

        Ok(Schema {
            id,
            fields,
            unknown: self.unknown,
            version: self.version,
        })
    }
}

fn parse_attributes(map: &serde_json::Map<String, Value>) -> SchemaResult<Vec<FieldDef>> {
    let mut defs = Vec::with_capacity(map.len());
    for (name, entry) in map {
        if name.starts_with("$$") {
            continue;
        }
        let def = match entry {
            Value::String(rule) => parse_rule(name, rule)?,
            Value::Object(nested) => {
                let rule = match nested.get("$$type") {
                    Some(Value::String(rule)) => rule.as_str(),
                    Some(_) => {
                        return Err(SchemaError::InvalidAttribute {
                            field: name.clone(),
                            reason: "$$type must be a rule string".into(),
                        })
                    }
                    None => "object",
                };
                let mut def = parse_rule(name, rule)?;
                if !matches!(def.ty, FieldType::Object(_)) {
                    return Err(SchemaError::InvalidAttribute {
                        field: name.clone(),
                        reason: "$$type of a nested object must be object".into(),
                    });
                }
                def.ty = FieldType::Object(parse_attributes(nested)?);
                def
            }
            _ => {
                return Err(SchemaError::InvalidAttribute {
                    field: name.clone(),
                    reason: "expected a rule string or a nested object".into(),
                })
            }
        };
        defs.push(def);
    }
    Ok(defs)
}

/// Check a field name and its default, recursing into nested objects.
fn validate_def(def: &FieldDef) -> SchemaResult<()> {
    validate_field_name(&def.name)?;

    if let Some(default) = &def.default {
        let mut errors = Vec::new();
        check_value(def, default, &def.name, UnknownFields::Reject, &mut errors);
        if let Some(first) = errors.first() {
            return Err(SchemaError::InvalidDefault {
                field: def.name.clone(),
                reason: first.message.clone(),
            });
        }
    }

    if let Some(children) = def.children() {
        let mut seen = std::collections::HashSet::new();
        for child in children {
            if !seen.insert(child.name.as_str()) {
                return Err(SchemaError::DuplicateField(format!("{}.{}", def.name, child.name)));
            }
            validate_def(child)?;
        }
    }
    Ok(())
}

/// Field names must be non-empty ASCII letters, digits, `_` or `-`, and may
/// not start with `_` (reserved for engine metadata).
fn validate_field_name(name: &str) -> SchemaResult<()> {
    let invalid = |reason: &str| SchemaError::InvalidFieldName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("field name must not be empty"));
    }
    if name.starts_with('_') {
        return Err(invalid("names starting with '_' are reserved"));
    }
    if name.contains('.') {
        return Err(invalid("'.' is reserved for nested paths"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("only ASCII letters, digits, '_' and '-' are allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_keeps_declaration_order() {
        let schema = Schema::builder()
            .field("zeta", "string")
            .field("alpha", "number")
            .build()
            .unwrap();
        assert_eq!(schema.field_order(), vec!["id", "zeta", "alpha"]);
    }

    #[test]
    fn builder_reports_first_error() {
        let err = Schema::builder()
            .field("ok", "string")
            .field("bad", "nonsense")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRule { field, .. } if field == "bad"));
    }

    #[test]
    fn rejects_reserved_and_dotted_names() {
        assert!(Schema::builder().field("_secret", "string").build().is_err());
        assert!(Schema::builder().field("a.b", "string").build().is_err());
        assert!(Schema::builder().field("has space", "string").build().is_err());
    }

    #[test]
    fn rejects_duplicates() {
        let err = Schema::builder()
            .field("a", "string")
            .field("a", "number")
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("a".into()));
    }

    #[test]
    fn rejects_invalid_default() {
        let err = Schema::builder()
            .field("n", "number|min:10|default:3")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn explicit_id_adds_constraints_but_is_never_required() {
        let schema = Schema::builder()
            .field("id", "string|required|minlength:3")
            .build()
            .unwrap();
        assert!(!schema.id_field().required);
        assert_eq!(schema.id_field().constraints.len(), 1);
        assert!(Schema::builder().field("id", "number").build().is_err());
    }

    #[test]
    fn nested_objects_via_builder() {
        let schema = Schema::builder()
            .object(
                "address",
                "object|required",
                Schema::builder().field("city", "string|required"),
            )
            .build()
            .unwrap();
        let city = schema.lookup("address.city").unwrap();
        assert!(city.required);
        assert!(schema.lookup("address.zip").is_none());
    }

    #[test]
    fn from_attributes_parses_nested_maps() {
        let schema = Schema::from_attributes(&json!({
            "name": "string|required",
            "address": {
                "$$type": "object|required",
                "city": "string",
                "zip": "string|maxlength:10"
            }
        }))
        .unwrap();

        let address = schema.field("address").unwrap();
        assert!(address.required);
        assert_eq!(address.children().unwrap().len(), 2);
        assert!(schema.lookup("address.zip").is_some());
    }

    #[test]
    fn from_attributes_rejects_non_rules() {
        assert!(Schema::from_attributes(&json!({"n": 5})).is_err());
        assert!(Schema::from_attributes(&json!(["string"])).is_err());
        assert!(Schema::from_attributes(&json!({"a": {"$$type": "string"}})).is_err());
    }

    #[test]
    fn extra_fields_skip_declared_names() {
        let schema = Schema::builder().field("createdAt", "string").build().unwrap();
        let extended = schema
            .with_extra_fields(vec![
                FieldDef::new("createdAt", FieldType::Date),
                FieldDef::new("updatedAt", FieldType::Date),
            ])
            .unwrap();
        assert_eq!(extended.field_order(), vec!["id", "createdAt", "updatedAt"]);
        assert!(matches!(extended.field("createdAt").unwrap().ty, FieldType::String));
    }

    #[test]
    fn unknown_policy_can_be_overridden() {
        let schema = Schema::builder().field("a", "string").build().unwrap();
        assert_eq!(schema.unknown_fields(), UnknownFields::Reject);
        let relaxed = schema.with_unknown_fields(UnknownFields::Drop);
        assert_eq!(relaxed.unknown_fields(), UnknownFields::Drop);
        assert_eq!(relaxed.field_order(), schema.field_order());
    }
}
