//! Listing options, pages and filters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use objdb_partition::value_at;
use objdb_types::Record;

/// Restrict a listing to one partition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionFilter {
    pub name: String,
    /// Values for exactly the partition's fields, keyed by field path.
    pub values: Record,
}

/// Pagination and scope of a listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Maximum number of keys read; `None` reads to the end.
    pub limit: Option<usize>,
    /// Opaque cursor from a previous [`Page`].
    pub cursor: Option<String>,
    pub partition: Option<PartitionFilter>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn partition(mut self, name: impl Into<String>, values: Record) -> Self {
        self.partition = Some(PartitionFilter {
            name: name.into(),
            values,
        });
        self
    }
}

/// One page of a listing.
///
/// A page can hold fewer than `limit` items when keys read for it belong to
/// soft-deleted records or to stale partition entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Pass to [`ListOptions::after`] for the next page; `None` at the end.
    pub next_cursor: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

/// Returns `true` if every filter entry equals the record's value at that
/// field path. Numbers compare by value, so `1` matches `1.0`.
pub fn matches_filter(record: &Record, filter: &Record) -> bool {
    filter.iter().all(|(path, expected)| match value_at(record, path) {
        Some(actual) => loosely_equal(actual, expected),
        None => expected.is_null(),
    })
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn filter_matching() {
        let record = rec(json!({"region": "EU", "total": 3, "address": {"city": "Lyon"}}));
        assert!(matches_filter(&record, &rec(json!({}))));
        assert!(matches_filter(&record, &rec(json!({"region": "EU"}))));
        assert!(matches_filter(&record, &rec(json!({"total": 3.0}))));
        assert!(matches_filter(&record, &rec(json!({"address.city": "Lyon"}))));
        assert!(matches_filter(&record, &rec(json!({"missing": null}))));
        assert!(!matches_filter(&record, &rec(json!({"region": "US"}))));
        assert!(!matches_filter(&record, &rec(json!({"missing": 1}))));
    }

    #[test]
    fn options_builder() {
        let opts = ListOptions::new()
            .limit(5)
            .after("k")
            .partition("byRegion", rec(json!({"region": "EU"})));
        assert_eq!(opts.limit, Some(5));
        assert_eq!(opts.cursor.as_deref(), Some("k"));
        assert_eq!(opts.partition.unwrap().name, "byRegion");
    }
}
