//! Parser for the rule language.
//!
//! A rule is a `|`-separated list of tokens. The first token names the type;
//! the rest are modifiers:
//!
//! | token            | applies to            | meaning                          |
//! |------------------|-----------------------|----------------------------------|
//! | `required`       | any                   | must be present after defaults   |
//! | `optional`       | any                   | may be absent (the default)      |
//! | `default:<v>`    | any                   | JSON literal, else a plain string|
//! | `min:<n>`        | number, array         | lower bound (items for arrays)   |
//! | `max:<n>`        | number, array         | upper bound (items for arrays)   |
//! | `minlength:<n>`  | string-like, array    | minimum length                   |
//! | `maxlength:<n>`  | string-like, array    | maximum length                   |
//! | `integer`        | number                | no fractional part               |
//! | `items:<type>`   | array                 | element type                     |
//! | `pattern:<re>`   | string, email         | regex; must be the last token    |
//!
//! Enumerations are written as the type token `enum:a,b,c`.

use regex::Regex;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::field::{Constraint, FieldDef, FieldType};

/// Parse `rule` into a field definition named `name`.
pub fn parse_rule(name: &str, rule: &str) -> SchemaResult<FieldDef> {
    let invalid = |reason: String| SchemaError::InvalidRule {
        field: name.to_string(),
        rule: rule.to_string(),
        reason,
    };

    // `pattern:` swallows the rest of the rule, since regexes contain `|`.
    let (head, pattern) = match rule.find("pattern:") {
        Some(pos) => (&rule[..pos], Some(&rule[pos + "pattern:".len()..])),
        None => (rule, None),
    };

    let mut tokens = head
        .split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let type_token = tokens
        .next()
        .ok_or_else(|| invalid("rule must start with a type".into()))?;

    let mut def = FieldDef::new(name, parse_type(type_token).map_err(invalid)?);
    let mut items: Option<FieldType> = None;

    for token in tokens {
        let (key, arg) = match token.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (token, None),
        };
        match (key, arg) {
            ("required", None) => def.required = true,
            ("optional", None) => def.required = false,
            ("integer", None) => def.constraints.push(Constraint::Integer),
            ("default", Some(raw)) => def.default = Some(parse_literal(raw)),
            ("min", Some(n)) | ("max", Some(n)) => {
                let is_min = key == "min";
                match def.ty {
                    FieldType::Number => {
                        let bound = parse_number(n).map_err(&invalid)?;
                        def.constraints.push(if is_min {
                            Constraint::Min(bound)
                        } else {
                            Constraint::Max(bound)
                        });
                    }
                    FieldType::Array(_) => {
                        let bound = parse_len(n).map_err(&invalid)?;
                        def.constraints.push(if is_min {
                            Constraint::MinLength(bound)
                        } else {
                            Constraint::MaxLength(bound)
                        });
                    }
                    _ => return Err(invalid(format!("'{key}' requires a number or array type"))),
                }
            }
            ("minlength", Some(n)) | ("maxlength", Some(n)) => {
                if !(def.ty.is_string_like() || matches!(def.ty, FieldType::Array(_))) {
                    return Err(invalid(format!("'{key}' requires a string or array type")));
                }
                let bound = parse_len(n).map_err(&invalid)?;
                def.constraints.push(if key == "minlength" {
                    Constraint::MinLength(bound)
                } else {
                    Constraint::MaxLength(bound)
                });
            }
            ("items", Some(item)) => {
                if !matches!(def.ty, FieldType::Array(_)) {
                    return Err(invalid("'items' requires the array type".into()));
                }
                items = Some(parse_type(item).map_err(&invalid)?);
            }
            _ => return Err(invalid(format!("unknown rule token {token:?}"))),
        }
    }

    if let Some(item) = items {
        def.ty = FieldType::Array(Box::new(item));
    }

    if def.constraints.iter().any(|c| matches!(c, Constraint::Integer))
        && !matches!(def.ty, FieldType::Number)
    {
        return Err(invalid("'integer' requires the number type".into()));
    }

    if let Some(pattern) = pattern {
        if !matches!(def.ty, FieldType::String | FieldType::Email) {
            return Err(invalid("'pattern' requires a string type".into()));
        }
        let regex = Regex::new(pattern).map_err(|e| invalid(format!("bad pattern: {e}")))?;
        def.constraints.push(Constraint::Pattern(regex));
    }

    Ok(def)
}

/// Parse a type token.
pub fn parse_type(token: &str) -> Result<FieldType, String> {
    if let Some(values) = token.strip_prefix("enum:") {
        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        if values.is_empty() {
            return Err("enum needs at least one value".into());
        }
        return Ok(FieldType::Enum(values));
    }
    match token {
        "string" => Ok(FieldType::String),
        "number" => Ok(FieldType::Number),
        "boolean" => Ok(FieldType::Boolean),
        "date" => Ok(FieldType::Date),
        "email" => Ok(FieldType::Email),
        "any" => Ok(FieldType::Any),
        "array" => Ok(FieldType::Array(Box::new(FieldType::Any))),
        "object" => Ok(FieldType::Object(Vec::new())),
        other => Err(format!("unknown type {other:?}")),
    }
}

fn parse_literal(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("{raw:?} is not a number"))
}

fn parse_len(raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| format!("{raw:?} is not a length"))
}
