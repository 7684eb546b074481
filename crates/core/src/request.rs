//! Request payloads for the three primitive store operations.
//!
//! Batch requests are keyed by table. The per-table collections are the unit the
//! chunker slices: `KeysAndAttributes::keys` for reads, `Vec<WriteRequest>` for
//! writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::table::{Item, TableName};

/// Per-table request collections, iterated in table-name order.
pub type RequestItems<T> = BTreeMap<TableName, T>;

/// Keys to read from one table, plus the read options that apply to all of them.
///
/// When a table's keys are split across several chunks, every slice carries a
/// copy of the same options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeysAndAttributes {
    pub keys: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_attribute_names: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

impl KeysAndAttributes {
    pub fn new(keys: Vec<Item>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    pub fn with_projection(mut self, expression: impl Into<String>) -> Self {
        self.projection_expression = Some(expression.into());
        self
    }

    pub fn with_attribute_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.expression_attribute_names
            .get_or_insert_with(BTreeMap::new)
            .insert(placeholder.into(), name.into());
        self
    }

    pub fn with_consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = Some(consistent);
        self
    }

    /// Same read options, different keys.
    pub fn with_keys(&self, keys: Vec<Item>) -> Self {
        Self {
            keys,
            projection_expression: self.projection_expression.clone(),
            expression_attribute_names: self.expression_attribute_names.clone(),
            consistent_read: self.consistent_read,
        }
    }
}

/// A single write against one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRequest {
    /// Create or fully replace an item.
    Put { item: Item },
    /// Delete the item identified by `key`.
    Delete { key: Item },
}

impl WriteRequest {
    pub fn put(item: Item) -> Self {
        Self::Put { item }
    }

    pub fn delete(key: Item) -> Self {
        Self::Delete { key }
    }

    /// The attribute map this write targets (the full item for puts).
    pub fn attributes(&self) -> &Item {
        match self {
            WriteRequest::Put { item } => item,
            WriteRequest::Delete { key } => key,
        }
    }
}

/// Logical batch read: any number of keys across any number of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchGetRequest {
    pub request_items: RequestItems<KeysAndAttributes>,
}

impl BatchGetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(request_items: RequestItems<KeysAndAttributes>) -> Self {
        Self { request_items }
    }

    /// Set the keys and read options for a table, replacing any previous entry.
    pub fn with_table(mut self, table: impl Into<TableName>, keys: KeysAndAttributes) -> Self {
        self.request_items.insert(table.into(), keys);
        self
    }

    /// Total number of keys across all tables.
    pub fn item_count(&self) -> usize {
        self.request_items.values().map(|k| k.keys.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// Logical batch write: any number of puts/deletes across any number of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchWriteRequest {
    pub request_items: RequestItems<Vec<WriteRequest>>,
}

impl BatchWriteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(request_items: RequestItems<Vec<WriteRequest>>) -> Self {
        Self { request_items }
    }

    pub fn with_table(mut self, table: impl Into<TableName>, writes: Vec<WriteRequest>) -> Self {
        self.request_items.insert(table.into(), writes);
        self
    }

    /// Append a single write to a table's list.
    pub fn push(&mut self, table: impl Into<TableName>, write: WriteRequest) {
        self.request_items.entry(table.into()).or_default().push(write);
    }

    pub fn item_count(&self) -> usize {
        self.request_items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// Condition applied to the sort key of a range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKeyCondition {
    Eq(JsonValue),
    Lt(JsonValue),
    Le(JsonValue),
    Gt(JsonValue),
    Ge(JsonValue),
    BeginsWith(String),
    Between(JsonValue, JsonValue),
}

/// Key condition of a range query: partition-key equality plus an optional
/// sort-key condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCondition {
    pub partition_key: String,
    pub partition_value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<(String, SortKeyCondition)>,
}

impl KeyCondition {
    pub fn partition(key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            partition_key: key.into(),
            partition_value: value.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, key: impl Into<String>, condition: SortKeyCondition) -> Self {
        self.sort = Some((key.into(), condition));
        self
    }
}

/// Parameters of a single-page range query.
///
/// `exclusive_start_key` is the continuation cursor: `None` starts from the
/// beginning of the range, `Some` resumes after the given key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table_name: TableName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    pub key_condition: KeyCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Maximum rows per page (the store may return fewer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Ascending sort-key order when `true`.
    pub scan_index_forward: bool,
    pub consistent_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
}

impl QueryRequest {
    pub fn new(table: impl Into<TableName>, key_condition: KeyCondition) -> Self {
        Self {
            table_name: table.into(),
            index_name: None,
            key_condition,
            projection_expression: None,
            limit: None,
            scan_index_forward: true,
            consistent_read: false,
            exclusive_start_key: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.scan_index_forward = false;
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index_name = Some(index.into());
        self
    }

    pub fn with_start_key(mut self, key: Item) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(id: u32) -> Item {
        let mut item = Item::new();
        item.insert("pk".to_string(), json!(id));
        item
    }

    #[test]
    fn with_keys_keeps_read_options() {
        let original = KeysAndAttributes::new(vec![key(1), key(2)])
            .with_projection("#n, age")
            .with_attribute_name("#n", "name")
            .with_consistent_read(true);

        let slice = original.with_keys(vec![key(2)]);

        assert_eq!(slice.keys, vec![key(2)]);
        assert_eq!(slice.projection_expression.as_deref(), Some("#n, age"));
        assert_eq!(
            slice.expression_attribute_names.as_ref().and_then(|m| m.get("#n")).map(String::as_str),
            Some("name")
        );
        assert_eq!(slice.consistent_read, Some(true));
    }

    #[test]
    fn item_counts_span_tables() {
        let get = BatchGetRequest::new()
            .with_table("a", KeysAndAttributes::new(vec![key(1), key(2)]))
            .with_table("b", KeysAndAttributes::new(vec![key(3)]));
        assert_eq!(get.item_count(), 3);

        let mut write = BatchWriteRequest::new();
        write.push("a", WriteRequest::put(key(1)));
        write.push("a", WriteRequest::delete(key(2)));
        write.push("b", WriteRequest::put(key(3)));
        assert_eq!(write.item_count(), 3);
        assert_eq!(write.request_items["a"].len(), 2);
    }

    #[test]
    fn write_request_serializes_tagged() {
        let json = serde_json::to_value(WriteRequest::delete(key(7))).unwrap();
        assert_eq!(json, json!({ "delete": { "key": { "pk": 7 } } }));
    }
}
