//! Partition definitions: which field values a partition projects.
//!
//! A field rule is a scalar type optionally followed by `maxlength:N`, which
//! keeps only the first `N` characters of the value. Projecting a date onto
//! its first ten characters partitions by day:
//!
//! ```text
//! byDay   = { createdAt = "date|maxlength:10" }
//! byPlace = { "address.country" = "string", "address.city" = "string" }
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use objdb_schema::rule::parse_type;
use objdb_schema::{FieldType, Schema};
use objdb_store::validate_name;
use objdb_types::Record;

use crate::error::{PartitionError, PartitionResult};

/// One projected field of a partition.
#[derive(Clone, Debug)]
pub struct PartitionField {
    /// Field name, or a dot path into a nested object.
    pub path: String,
    pub ty: FieldType,
    /// Keep only this many leading characters of the value.
    pub max_length: Option<usize>,
}

impl PartitionField {
    /// Parse a field rule such as `string` or `date|maxlength:10`.
    pub fn parse(partition: &str, path: &str, rule: &str) -> PartitionResult<Self> {
        let invalid = |reason: String| PartitionError::InvalidDefinition {
            partition: partition.to_string(),
            reason,
        };

        validate_name("partition field", path).map_err(|e| invalid(e.to_string()))?;
        if path.split('.').any(str::is_empty) {
            return Err(invalid(format!("malformed field path {path:?}")));
        }

        let mut tokens = rule.split('|').map(str::trim);
        let ty_token = tokens.next().unwrap_or_default();
        let ty = parse_type(ty_token).map_err(|e| invalid(format!("field {path}: {e}")))?;
        if !is_scalar(&ty) {
            return Err(invalid(format!("field {path}: type {ty} cannot be partitioned")));
        }

        let mut max_length = None;
        for token in tokens.filter(|t| !t.is_empty()) {
            match token.split_once(':') {
                Some(("maxlength", n)) => {
                    let n: usize = n
                        .trim()
                        .parse()
                        .map_err(|_| invalid(format!("field {path}: bad maxlength {n:?}")))?;
                    if n == 0 {
                        return Err(invalid(format!("field {path}: maxlength must be positive")));
                    }
                    max_length = Some(n);
                }
                _ => return Err(invalid(format!("field {path}: unknown rule {token:?}"))),
            }
        }

        Ok(Self {
            path: path.to_string(),
            ty,
            max_length,
        })
    }

    /// Key segment value for this field, or `None` when the record has no
    /// usable value.
    pub fn project(&self, record: &Record) -> Option<String> {
        let raw = match value_at(record, &self.path)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        Some(match self.max_length {
            Some(n) => raw.chars().take(n).collect(),
            None => raw,
        })
    }
}

/// A named partition over one or more fields, in key order.
#[derive(Clone, Debug)]
pub struct PartitionDefinition {
    name: String,
    fields: Vec<PartitionField>,
}

impl PartitionDefinition {
    /// An empty definition; add fields with [`field`](Self::field).
    pub fn new(name: &str) -> PartitionResult<Self> {
        validate_name("partition", name).map_err(|e| PartitionError::InvalidDefinition {
            partition: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            fields: Vec::new(),
        })
    }

    /// Append a field; key segments follow the order fields are added in.
    pub fn field(mut self, path: &str, rule: &str) -> PartitionResult<Self> {
        if self.fields.iter().any(|f| f.path == path) {
            return Err(PartitionError::InvalidDefinition {
                partition: self.name,
                reason: format!("field {path} listed twice"),
            });
        }
        self.fields.push(PartitionField::parse(&self.name, path, rule)?);
        Ok(self)
    }

    /// Build from a `field -> rule` map. Fields are ordered by name.
    pub fn from_map(name: &str, fields: &BTreeMap<String, String>) -> PartitionResult<Self> {
        fields
            .iter()
            .try_fold(Self::new(name)?, |def, (path, rule)| def.field(path, rule))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[PartitionField] {
        &self.fields
    }

    /// Check the definition against the resource schema: at least one field,
    /// and every field declared with a compatible type.
    pub fn validate_against(&self, schema: &Schema) -> PartitionResult<()> {
        let invalid = |reason: String| PartitionError::InvalidDefinition {
            partition: self.name.clone(),
            reason,
        };
        if self.fields.is_empty() {
            return Err(invalid("no fields".into()));
        }
        for field in &self.fields {
            let def = schema
                .lookup(&field.path)
                .ok_or_else(|| invalid(format!("field {} is not in the schema", field.path)))?;
            if !compatible(&field.ty, &def.ty) {
                return Err(invalid(format!(
                    "field {} is {} in the schema, not {}",
                    field.path, def.ty, field.ty
                )));
            }
        }
        Ok(())
    }

    /// `(field, value)` key segments for `record`, or `None` when any field
    /// is absent. Records missing a field have no entry in this partition.
    pub fn segments(&self, record: &Record) -> Option<Vec<(String, String)>> {
        self.fields
            .iter()
            .map(|f| Some((f.path.clone(), f.project(record)?)))
            .collect()
    }

    /// Segments for an exact-match filter, if the filter's keys are exactly
    /// this partition's fields. Nested fields are given as dot-path keys.
    pub fn segments_for_filter(&self, filter: &Record) -> Option<Vec<(String, String)>> {
        if filter.len() != self.fields.len()
            || !self.fields.iter().all(|f| filter.contains_key(&f.path))
        {
            return None;
        }
        self.segments(filter)
    }
}

/// Value at a dot path (`address.city`) inside a record.
///
/// A literal key equal to the whole path wins, so flat filter maps keyed by
/// dot paths resolve too.
pub fn value_at<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_scalar(ty: &FieldType) -> bool {
    matches!(
        ty,
        FieldType::String
            | FieldType::Number
            | FieldType::Boolean
            | FieldType::Date
            | FieldType::Email
            | FieldType::Enum(_)
    )
}

/// A partition field may narrow a schema type to `string` when the schema
/// type is stored as a string.
fn compatible(partition: &FieldType, schema: &FieldType) -> bool {
    partition.name() == schema.name()
        || (matches!(partition, FieldType::String) && schema.is_string_like())
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_schema::SchemaBuilder;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::builder()
            .field("region", "string")
            .field("status", "enum:open,closed")
            .field("createdAt", "date")
            .field("total", "number")
            .field("tags", "array")
            .object(
                "address",
                "object",
                SchemaBuilder::default().field("city", "string"),
            )
            .build()
            .unwrap()
    }

    fn rec(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn parse_rules() {
        let field = PartitionField::parse("byDay", "createdAt", "date|maxlength:10").unwrap();
        assert_eq!(field.max_length, Some(10));
        assert!(matches!(field.ty, FieldType::Date));

        assert!(PartitionField::parse("p", "tags", "array").is_err());
        assert!(PartitionField::parse("p", "region", "string|required").is_err());
        assert!(PartitionField::parse("p", "region", "string|maxlength:0").is_err());
        assert!(PartitionField::parse("p", "a..b", "string").is_err());
    }

    #[test]
    fn partition_names_are_key_segments() {
        assert!(PartitionDefinition::new("byRegion").is_ok());
        assert!(PartitionDefinition::new("by/region").is_err());
        assert!(PartitionDefinition::new("").is_err());
    }

    #[test]
    fn validates_against_schema() {
        let schema = schema();
        let ok = PartitionDefinition::new("byCity")
            .unwrap()
            .field("address.city", "string")
            .unwrap();
        assert!(ok.validate_against(&schema).is_ok());

        let narrowed = PartitionDefinition::new("byStatus")
            .unwrap()
            .field("status", "string")
            .unwrap();
        assert!(narrowed.validate_against(&schema).is_ok());

        let missing = PartitionDefinition::new("byCountry")
            .unwrap()
            .field("country", "string")
            .unwrap();
        assert!(missing.validate_against(&schema).is_err());

        let mistyped = PartitionDefinition::new("byTotal")
            .unwrap()
            .field("total", "string")
            .unwrap();
        assert!(mistyped.validate_against(&schema).is_err());

        let empty = PartitionDefinition::new("nothing").unwrap();
        assert!(empty.validate_against(&schema).is_err());
    }

    #[test]
    fn duplicate_fields_rejected() {
        let def = PartitionDefinition::new("p").unwrap().field("region", "string").unwrap();
        assert!(def.field("region", "string").is_err());
    }

    #[test]
    fn segments_follow_field_order() {
        let def = PartitionDefinition::new("p")
            .unwrap()
            .field("region", "string")
            .unwrap()
            .field("total", "number")
            .unwrap();
        let segs = def.segments(&rec(json!({"region": "EU", "total": 12}))).unwrap();
        assert_eq!(
            segs,
            vec![("region".into(), "EU".into()), ("total".into(), "12".into())]
        );
        assert!(def.segments(&rec(json!({"region": "EU"}))).is_none());
        assert!(def.segments(&rec(json!({"region": "EU", "total": null}))).is_none());
    }

    #[test]
    fn maxlength_projects_prefix() {
        let def = PartitionDefinition::new("byDay")
            .unwrap()
            .field("createdAt", "date|maxlength:10")
            .unwrap();
        let segs = def
            .segments(&rec(json!({"createdAt": "2024-03-01T10:00:00Z"})))
            .unwrap();
        assert_eq!(segs[0].1, "2024-03-01");
    }

    #[test]
    fn dot_paths_read_nested_values() {
        let def = PartitionDefinition::new("byCity")
            .unwrap()
            .field("address.city", "string")
            .unwrap();
        let segs = def
            .segments(&rec(json!({"address": {"city": "Lyon"}})))
            .unwrap();
        assert_eq!(segs, vec![("address.city".into(), "Lyon".into())]);

        let filter = rec(json!({"address.city": "Lyon"}));
        assert_eq!(def.segments_for_filter(&filter), Some(segs));
    }

    #[test]
    fn filters_must_match_exactly() {
        let def = PartitionDefinition::new("p").unwrap().field("region", "string").unwrap();
        assert!(def.segments_for_filter(&rec(json!({"region": "EU"}))).is_some());
        assert!(def
            .segments_for_filter(&rec(json!({"region": "EU", "total": 1})))
            .is_none());
        assert!(def.segments_for_filter(&rec(json!({"total": 1}))).is_none());
    }

    #[test]
    fn from_map_orders_by_name() {
        let fields: BTreeMap<String, String> = [
            ("region".to_string(), "string".to_string()),
            ("createdAt".to_string(), "date|maxlength:7".to_string()),
        ]
        .into_iter()
        .collect();
        let def = PartitionDefinition::from_map("byMonth", &fields).unwrap();
        let paths: Vec<_> = def.fields().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["createdAt", "region"]);
    }
}
