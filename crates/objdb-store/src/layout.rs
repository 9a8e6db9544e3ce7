//! Key hierarchy for resources and their partitions.
//!
//! Values embedded in keys are escaped so that `/` and `=` keep their
//! structural meaning: `%` becomes `%25`, `/` becomes `%2F`, `=` becomes
//! `%3D`. Ids are validated rather than escaped (they may not contain `/`).

use crate::error::{StoreError, StoreResult};

const ID_SEGMENT: &str = "id=";

/// Escape a value for use inside a key segment.
pub fn escape_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_segment`].
pub fn unescape_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (decoded, consumed) = match tail.get(..3) {
            Some("%25") => ('%', 3),
            Some("%2F") => ('/', 3),
            Some("%3D") => ('=', 3),
            _ => ('%', 1),
        };
        out.push(decoded);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

/// Validate a resource, partition, or field name used as a key segment.
///
/// Names must be non-empty and consist of ASCII letters, digits, `_`, `-`
/// or `.`.
pub fn validate_name(kind: &str, name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidKey(format!("{kind} name must not be empty")));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(StoreError::InvalidKey(format!(
            "{kind} name {name:?} contains forbidden character {ch:?}"
        )));
    }
    Ok(())
}

/// Key layout of one resource, optionally under a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    root: String,
}

impl KeyLayout {
    /// Build the layout for `resource`, prefixed by `namespace` if given.
    ///
    /// Namespace components are separated by `/` and each must be a valid
    /// name.
    pub fn new(namespace: Option<&str>, resource: &str) -> StoreResult<Self> {
        validate_name("resource", resource)?;
        let root = match namespace {
            Some(ns) => {
                for component in ns.split('/') {
                    validate_name("namespace", component)?;
                }
                format!("{ns}/resource={resource}")
            }
            None => format!("resource={resource}"),
        };
        Ok(Self { root })
    }

    /// Prefix shared by every key of the resource.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Prefix under which canonical objects live.
    pub fn canonical_prefix(&self) -> String {
        format!("{}/{ID_SEGMENT}", self.root)
    }

    /// Key of the canonical object for `id`.
    pub fn canonical_key(&self, id: &str) -> String {
        format!("{}/{ID_SEGMENT}{id}", self.root)
    }

    /// Prefix of every entry of `partition`.
    pub fn partition_root(&self, partition: &str) -> String {
        format!("{}/partition={partition}/", self.root)
    }

    /// Prefix of the entries matching the given `(field, value)` segments.
    pub fn partition_prefix(&self, partition: &str, segments: &[(String, String)]) -> String {
        let mut prefix = self.partition_root(partition);
        for (field, value) in segments {
            prefix.push_str(field);
            prefix.push('=');
            prefix.push_str(&escape_segment(value));
            prefix.push('/');
        }
        prefix.push_str(ID_SEGMENT);
        prefix
    }

    /// Key of the partition entry for `id`.
    pub fn partition_key(&self, partition: &str, segments: &[(String, String)], id: &str) -> String {
        let mut key = self.partition_prefix(partition, segments);
        key.push_str(id);
        key
    }

    /// Extract the record id from a canonical or partition key.
    pub fn id_from_key(key: &str) -> Option<&str> {
        let (_, id) = key.rsplit_once(&format!("/{ID_SEGMENT}"))?;
        (!id.is_empty()).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[test]
    fn canonical_keys() {
        let layout = KeyLayout::new(None, "users").unwrap();
        assert_eq!(layout.canonical_key("u1"), "resource=users/id=u1");
        assert_eq!(layout.canonical_prefix(), "resource=users/id=");
    }

    #[test]
    fn namespaced_keys() {
        let layout = KeyLayout::new(Some("tenant-a"), "users").unwrap();
        assert_eq!(layout.canonical_key("u1"), "tenant-a/resource=users/id=u1");
    }

    #[test]
    fn partition_keys() {
        let layout = KeyLayout::new(None, "users").unwrap();
        let key = layout.partition_key(
            "byRegion",
            &[seg("region", "US"), seg("tier", "gold")],
            "u1",
        );
        assert_eq!(
            key,
            "resource=users/partition=byRegion/region=US/tier=gold/id=u1"
        );
    }

    #[test]
    fn partition_values_are_escaped() {
        let layout = KeyLayout::new(None, "docs").unwrap();
        let key = layout.partition_key("byPath", &[seg("path", "a/b=c%")], "d1");
        assert_eq!(key, "resource=docs/partition=byPath/path=a%2Fb%3Dc%25/id=d1");
    }

    #[test]
    fn escape_roundtrip() {
        for value in ["plain", "a/b", "x=y", "100%", "%2F literal"] {
            assert_eq!(unescape_segment(&escape_segment(value)), value);
        }
    }

    #[test]
    fn id_extraction() {
        assert_eq!(KeyLayout::id_from_key("resource=users/id=u1"), Some("u1"));
        assert_eq!(
            KeyLayout::id_from_key("ns/resource=users/partition=p/f=v/id=a=b"),
            Some("a=b")
        );
        assert_eq!(KeyLayout::id_from_key("resource=users/id="), None);
        assert_eq!(KeyLayout::id_from_key("garbage"), None);
    }

    #[test]
    fn rejects_bad_names() {
        assert!(KeyLayout::new(None, "").is_err());
        assert!(KeyLayout::new(None, "a/b").is_err());
        assert!(KeyLayout::new(Some("ns//x"), "users").is_err());
        assert!(validate_name("partition", "by region").is_err());
    }
}
