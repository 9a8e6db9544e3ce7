use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The string-valued metadata map of a stored object.
///
/// Object stores bound metadata by the summed UTF-8 length of every key and
/// value; [`Metadata::byte_size`] computes exactly that figure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Create an empty metadata map.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sum of key and value byte lengths.
    pub fn byte_size(&self) -> usize {
        self.0.iter().map(|(k, v)| entry_size(k, v)).sum()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Bytes a single metadata entry consumes against the budget.
pub fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

impl FromIterator<(String, String)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_counts_keys_and_values() {
        let mut meta = Metadata::new();
        meta.insert("0", "hello");
        meta.insert("_v", "1");
        assert_eq!(meta.byte_size(), 1 + 5 + 2 + 1);
    }

    #[test]
    fn byte_size_uses_utf8_length() {
        let mut meta = Metadata::new();
        meta.insert("k", "é");
        assert_eq!(meta.byte_size(), 3);
    }

    #[test]
    fn insert_replaces() {
        let mut meta = Metadata::new();
        assert!(meta.insert("a", "1").is_none());
        assert_eq!(meta.insert("a", "2").as_deref(), Some("1"));
        assert_eq!(meta.get("a"), Some("2"));
        assert_eq!(meta.len(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn byte_size_is_sum_of_entries(entries in proptest::collection::btree_map("[a-z0-9_]{1,8}", "\\PC{0,16}", 0..12)) {
                let meta: Metadata = entries.clone().into_iter().collect();
                let expected: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
                prop_assert_eq!(meta.byte_size(), expected);
                prop_assert_eq!(meta.len(), entries.len());
            }

            #[test]
            fn serde_is_a_plain_map(entries in proptest::collection::btree_map("[a-z]{1,4}", "[ -~]{0,8}", 0..6)) {
                let meta: Metadata = entries.clone().into_iter().collect();
                let json = serde_json::to_value(&meta).unwrap();
                prop_assert_eq!(json, serde_json::to_value(&entries).unwrap());
            }
        }
    }
}
