//! Table key schemas and key values.

use std::cmp::Ordering;

use betterbatch_core::{Item, SortKeyCondition, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Key layout of a table: a partition key and an optional sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

/// Primary key of a stored item: (partition value, sort value).
pub(crate) type StoredKey = (KeyValue, Option<KeyValue>);

impl TableSchema {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    /// Primary key of a full item (extra attributes are allowed).
    pub(crate) fn key_of(&self, item: &Item) -> Result<StoredKey, StoreError> {
        let partition = key_attribute(item, &self.partition_key)?;
        let sort = match &self.sort_key {
            Some(name) => Some(key_attribute(item, name)?),
            None => None,
        };
        Ok((partition, sort))
    }

    /// Primary key of a key descriptor, which must hold the key attributes and
    /// nothing else.
    pub(crate) fn parse_key(&self, key: &Item) -> Result<StoredKey, StoreError> {
        let expected = 1 + usize::from(self.sort_key.is_some());
        if key.len() != expected {
            return Err(StoreError::validation(format!(
                "key must contain exactly the key attributes ({expected}), got {}",
                key.len()
            )));
        }
        self.key_of(key)
    }

    /// Only the key attributes of `item`, as used for continuation cursors.
    pub(crate) fn key_attributes(&self, item: &Item) -> Item {
        std::iter::once(&self.partition_key)
            .chain(self.sort_key.as_ref())
            .filter_map(|name| item.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}

fn key_attribute(item: &Item, name: &str) -> Result<KeyValue, StoreError> {
    let value = item
        .get(name)
        .ok_or_else(|| StoreError::validation(format!("missing key attribute '{name}'")))?;
    KeyValue::from_json(value)
        .ok_or_else(|| StoreError::validation(format!("key attribute '{name}' must be a string or number")))
}

/// A scalar key value. Numbers sort before strings.
#[derive(Debug, Clone)]
pub enum KeyValue {
    Number(f64),
    String(String),
}

impl KeyValue {
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_f64().map(KeyValue::Number),
            JsonValue::String(s) => Some(KeyValue::String(s.clone())),
            _ => None,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Number(a), KeyValue::Number(b)) => a.total_cmp(b),
            (KeyValue::String(a), KeyValue::String(b)) => a.cmp(b),
            (KeyValue::Number(_), KeyValue::String(_)) => Ordering::Less,
            (KeyValue::String(_), KeyValue::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

fn operand(value: &JsonValue) -> Result<KeyValue, StoreError> {
    KeyValue::from_json(value)
        .ok_or_else(|| StoreError::validation("sort key condition operand must be a string or number"))
}

/// Whether a sort key value satisfies `condition`.
pub(crate) fn sort_condition_matches(condition: &SortKeyCondition, value: &KeyValue) -> Result<bool, StoreError> {
    let matched = match condition {
        SortKeyCondition::Eq(v) => *value == operand(v)?,
        SortKeyCondition::Lt(v) => *value < operand(v)?,
        SortKeyCondition::Le(v) => *value <= operand(v)?,
        SortKeyCondition::Gt(v) => *value > operand(v)?,
        SortKeyCondition::Ge(v) => *value >= operand(v)?,
        SortKeyCondition::Between(low, high) => {
            let (low, high) = (operand(low)?, operand(high)?);
            *value >= low && *value <= high
        }
        SortKeyCondition::BeginsWith(prefix) => match value {
            KeyValue::String(s) => s.starts_with(prefix.as_str()),
            KeyValue::Number(_) => {
                return Err(StoreError::validation("begins_with requires a string sort key"));
            }
        },
    };
    Ok(matched)
}
