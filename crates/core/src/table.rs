//! Table names and item values.

use core::borrow::Borrow;
use serde::{Deserialize, Serialize};

/// A single stored item (or key descriptor): attribute name → attribute value.
///
/// The batch engine never inspects attribute values; it only moves items between
/// requests, responses and accumulators.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Name of a table in the remote store.
///
/// Ordering is lexicographic, which is the stable order batch requests are
/// iterated in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TableName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TableName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl Borrow<str> for TableName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
