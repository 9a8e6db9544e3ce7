use regex::Regex;
use serde_json::Value;

/// Declared type of a field.
#[derive(Clone, Debug)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// RFC 3339 timestamp or `YYYY-MM-DD` date, stored as a string.
    Date,
    Email,
    /// Any JSON value, stored opaquely.
    Any,
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// Homogeneous array.
    Array(Box<FieldType>),
    /// Nested object with its own fields. Always written as a whole.
    Object(Vec<FieldDef>),
}

impl FieldType {
    /// Short name used in rule strings and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Email => "email",
            Self::Any => "any",
            Self::Enum(_) => "enum",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Types whose values are strings once normalized.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Date | Self::Email | Self::Enum(_)
        )
    }

    /// Types that may be shortened when a record overflows its budget.
    pub fn is_truncatable(&self) -> bool {
        matches!(self, Self::String | Self::Array(_))
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Array(item) => write!(f, "array<{item}>"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// A typed constraint, parsed from a rule token.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// Minimum string length (chars) or array length (items).
    MinLength(usize),
    /// Maximum string length (chars) or array length (items).
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Integer,
    Pattern(Regex),
}

impl Constraint {
    /// Rule identifier reported in validation errors.
    pub fn rule(&self) -> &'static str {
        match self {
            Self::MinLength(_) => "minlength",
            Self::MaxLength(_) => "maxlength",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Integer => "integer",
            Self::Pattern(_) => "pattern",
        }
    }
}

/// One declared field.
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Vec<Constraint>,
}

impl FieldDef {
    /// An optional field with no constraints.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            constraints: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Nested fields, when this is an object field.
    pub fn children(&self) -> Option<&[FieldDef]> {
        match &self.ty {
            FieldType::Object(children) => Some(children),
            _ => None,
        }
    }
}
