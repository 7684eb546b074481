//! Response payloads of the primitive store operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::{KeysAndAttributes, RequestItems, WriteRequest};
use crate::table::{Item, TableName};

/// Rows returned per table.
pub type TableRows = BTreeMap<TableName, Vec<Item>>;

/// Result of one bounded batch read.
///
/// `unprocessed_keys` has the same shape as the request: whatever the store
/// declined to read in this call. An empty map means every key was handled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchGetOutput {
    pub responses: TableRows,
    #[serde(default)]
    pub unprocessed_keys: RequestItems<KeysAndAttributes>,
}

/// Result of one bounded batch write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchWriteOutput {
    #[serde(default)]
    pub unprocessed_items: RequestItems<Vec<WriteRequest>>,
}

/// One page of a range query.
///
/// `last_evaluated_key` is present when more pages remain; pass it back as
/// `QueryRequest::exclusive_start_key` to fetch the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Item>,
}

impl QueryOutput {
    pub fn has_more(&self) -> bool {
        self.last_evaluated_key.is_some()
    }
}
