//! Row accumulation across chunks and retry attempts.

use betterbatch_core::{Item, TableRows};

/// Rows gathered by one batch-read call, per table, in arrival order.
///
/// One accumulator per call: each chunk fills its own, and the orchestrator
/// appends chunk accumulators in chunk order. No deduplication; the store never
/// returns the same key from two different chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowAccumulator {
    rows: TableRows,
    row_count: usize,
}

impl RowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge rows returned by a single store call.
    ///
    /// A table that appears with zero rows is still recorded, so callers can
    /// tell "asked and got nothing" from "never asked".
    pub fn extend(&mut self, rows: TableRows) {
        for (table, table_rows) in rows {
            self.row_count += table_rows.len();
            self.rows.entry(table).or_default().extend(table_rows);
        }
    }

    /// Append everything from a later accumulator (e.g. the next chunk).
    pub fn append(&mut self, other: RowAccumulator) {
        self.extend(other.rows);
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn table(&self, table: &str) -> &[Item] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_rows(self) -> TableRows {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use betterbatch_core::TableName;
    use serde_json::json;

    use super::*;

    fn row(id: u32) -> Item {
        let mut item = Item::new();
        item.insert("id".to_string(), json!(id));
        item
    }

    fn rows(table: &str, ids: &[u32]) -> TableRows {
        let mut out = TableRows::new();
        out.insert(TableName::from(table), ids.iter().copied().map(row).collect());
        out
    }

    #[test]
    fn preserves_arrival_order_per_table() {
        let mut acc = RowAccumulator::new();
        acc.extend(rows("users", &[1, 2]));
        acc.extend(rows("orders", &[10]));
        acc.extend(rows("users", &[3]));

        assert_eq!(acc.table("users"), &[row(1), row(2), row(3)]);
        assert_eq!(acc.table("orders"), &[row(10)]);
        assert_eq!(acc.row_count(), 4);
    }

    #[test]
    fn append_concatenates_after_existing_rows() {
        let mut first = RowAccumulator::new();
        first.extend(rows("users", &[1]));
        let mut second = RowAccumulator::new();
        second.extend(rows("users", &[2, 3]));

        first.append(second);

        assert_eq!(first.table("users"), &[row(1), row(2), row(3)]);
        assert_eq!(first.row_count(), 3);
    }

    #[test]
    fn empty_table_response_is_recorded() {
        let mut acc = RowAccumulator::new();
        acc.extend(rows("users", &[]));

        assert!(acc.is_empty());
        assert!(acc.into_rows().contains_key("users"));
    }

    #[test]
    fn unknown_table_is_empty_slice() {
        assert!(RowAccumulator::new().table("missing").is_empty());
    }
}
