//! Splitting per-table request items into store-legal chunks.
//!
//! ## Algorithm
//!
//! Tables are visited in `RequestItems` order (table name). Each table's items
//! are cut into runs sized to exactly fill the remaining capacity of the chunk
//! being built; a full chunk is sealed and a new one started. A table can
//! therefore straddle a chunk boundary, appearing at the end of one chunk and
//! the start of the next. The last chunk is kept even when it is not full.
//!
//! ## Guarantees
//!
//! - Every chunk holds between 1 and `limit` items.
//! - Concatenating a table's slices across all chunks, in chunk order, yields
//!   exactly the input list in its input order.
//! - No input items → no chunks. Tables with no items never appear in a chunk.

use betterbatch_core::{KeysAndAttributes, RequestItems, WriteRequest};

/// A per-table collection the chunker can slice.
///
/// Reads slice `KeysAndAttributes::keys` and copy the read options onto every
/// slice; writes slice the list of write requests.
pub trait TableItems: Clone + Send + Sync + 'static {
    fn item_count(&self) -> usize;

    /// Remove the first `n` items and return them with the same table-level
    /// options. `n` never exceeds `item_count()`.
    fn take_front(&mut self, n: usize) -> Self;
}

impl TableItems for KeysAndAttributes {
    fn item_count(&self) -> usize {
        self.keys.len()
    }

    fn take_front(&mut self, n: usize) -> Self {
        let rest = self.keys.split_off(n);
        let front = std::mem::replace(&mut self.keys, rest);
        self.with_keys(front)
    }
}

impl TableItems for Vec<WriteRequest> {
    fn item_count(&self) -> usize {
        self.len()
    }

    fn take_front(&mut self, n: usize) -> Self {
        let rest = self.split_off(n);
        std::mem::replace(self, rest)
    }
}

/// Total items across all tables.
pub fn total_items<T: TableItems>(items: &RequestItems<T>) -> usize {
    items.values().map(TableItems::item_count).sum()
}

/// Partition `items` into chunks of at most `limit` items each.
///
/// # Panics
///
/// If `limit` is zero. `BatchConfig::validate` rejects such configurations
/// before they reach here.
pub fn chunk_request_items<T: TableItems>(items: RequestItems<T>, limit: usize) -> Vec<RequestItems<T>> {
    assert!(limit > 0, "chunk limit must be greater than zero");

    let mut chunks = Vec::with_capacity(total_items(&items).div_ceil(limit));
    let mut current = RequestItems::new();
    let mut current_size = 0usize;

    for (table, mut table_items) in items {
        while table_items.item_count() > 0 {
            let capacity = limit - current_size;
            let slice = table_items.take_front(capacity.min(table_items.item_count()));

            current_size += slice.item_count();
            current.insert(table.clone(), slice);

            if current_size == limit {
                chunks.push(std::mem::take(&mut current));
                current_size = 0;
            }
        }
    }

    if current_size > 0 {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use betterbatch_core::{Item, TableName};
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn key(table: &str, id: usize) -> Item {
        let mut item = Item::new();
        item.insert("table".to_string(), json!(table));
        item.insert("id".to_string(), json!(id));
        item
    }

    fn writes(table: &str, n: usize) -> Vec<WriteRequest> {
        (0..n).map(|i| WriteRequest::put(key(table, i))).collect()
    }

    fn sizes<T: TableItems>(chunks: &[RequestItems<T>]) -> Vec<usize> {
        chunks.iter().map(total_items).collect()
    }

    /// Per-table concatenation of all chunks, in chunk order.
    fn reassemble<T: TableItems>(chunks: &[RequestItems<T>]) -> RequestItems<Vec<T>> {
        let mut out: RequestItems<Vec<T>> = RequestItems::new();
        for chunk in chunks {
            for (table, items) in chunk {
                out.entry(table.clone()).or_default().push(items.clone());
            }
        }
        out
    }

    #[test]
    fn single_table_splits_at_boundary() {
        let mut items = RequestItems::new();
        items.insert(TableName::from("users"), writes("users", 2 * 25 + 1));

        let chunks = chunk_request_items(items, 25);

        assert_eq!(sizes(&chunks), vec![25, 25, 1]);
    }

    #[test]
    #[should_panic(expected = "chunk limit must be greater than zero")]
    fn zero_limit_panics() {
        let mut items = RequestItems::new();
        items.insert(TableName::from("a"), writes("a", 1));
        let _ = chunk_request_items(items, 0);
    }

    #[test]
    fn exact_multiple_has_no_trailing_chunk() {
        let mut items = RequestItems::new();
        items.insert(TableName::from("users"), writes("users", 50));

        let chunks = chunk_request_items(items, 25);

        assert_eq!(sizes(&chunks), vec![25, 25]);
    }

    #[test]
    fn empty_request_produces_no_chunks() {
        let chunks = chunk_request_items(RequestItems::<Vec<WriteRequest>>::new(), 25);
        assert!(chunks.is_empty());
    }

    #[test]
    fn empty_tables_are_skipped() {
        let mut items = RequestItems::new();
        items.insert(TableName::from("a"), writes("a", 0));
        items.insert(TableName::from("b"), writes("b", 3));

        let chunks = chunk_request_items(items, 25);

        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].contains_key("a"));
        assert_eq!(chunks[0]["b"].len(), 3);
    }

    #[test]
    fn table_straddles_chunk_boundary() {
        let mut items = RequestItems::new();
        items.insert(TableName::from("a"), writes("a", 20));
        items.insert(TableName::from("b"), writes("b", 10));

        let chunks = chunk_request_items(items, 25);

        assert_eq!(sizes(&chunks), vec![25, 5]);
        assert_eq!(chunks[0]["a"].len(), 20);
        assert_eq!(chunks[0]["b"].len(), 5);
        assert_eq!(chunks[1]["b"].len(), 5);
        assert!(!chunks[1].contains_key("a"));

        // The second chunk resumes where the first stopped.
        assert_eq!(chunks[1]["b"][0], WriteRequest::put(key("b", 5)));
    }

    #[test]
    fn read_options_are_copied_to_every_slice() {
        let keys: Vec<Item> = (0..150).map(|i| key("users", i)).collect();
        let mut items = RequestItems::new();
        items.insert(
            TableName::from("users"),
            KeysAndAttributes::new(keys)
                .with_projection("id, email")
                .with_consistent_read(true),
        );

        let chunks = chunk_request_items(items, 100);

        assert_eq!(sizes(&chunks), vec![100, 50]);
        for chunk in &chunks {
            let slice = &chunk["users"];
            assert_eq!(slice.projection_expression.as_deref(), Some("id, email"));
            assert_eq!(slice.consistent_read, Some(true));
        }
        assert_eq!(chunks[1]["users"].keys[0], key("users", 100));
    }

    fn table_sizes() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(0usize..120, 0..6)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: re-joining every table's slices reproduces the input lists.
        #[test]
        fn chunks_reassemble_to_original(table_sizes in table_sizes(), limit in 1usize..40) {
            let mut items = RequestItems::new();
            for (t, n) in table_sizes.iter().enumerate() {
                let name = format!("table_{t}");
                items.insert(TableName::from(name.clone()), writes(&name, *n));
            }
            let original = items.clone();

            let chunks = chunk_request_items(items, limit);

            let rejoined: RequestItems<Vec<WriteRequest>> = reassemble(&chunks)
                .into_iter()
                .map(|(table, slices)| (table, slices.concat()))
                .collect();
            let expected: RequestItems<Vec<WriteRequest>> = original
                .into_iter()
                .filter(|(_, writes)| !writes.is_empty())
                .collect();
            prop_assert_eq!(rejoined, expected);
        }

        /// Property: every chunk is non-empty and within the limit; only the
        /// last one may be short.
        #[test]
        fn chunks_respect_limit(table_sizes in table_sizes(), limit in 1usize..40) {
            let total: usize = table_sizes.iter().sum();
            let mut items = RequestItems::new();
            for (t, n) in table_sizes.iter().enumerate() {
                let name = format!("table_{t}");
                items.insert(TableName::from(name.clone()), writes(&name, *n));
            }

            let chunks = chunk_request_items(items, limit);
            let sizes = sizes(&chunks);

            prop_assert_eq!(sizes.iter().sum::<usize>(), total);
            prop_assert_eq!(chunks.len(), total.div_ceil(limit));
            for (i, size) in sizes.iter().enumerate() {
                prop_assert!(*size >= 1 && *size <= limit);
                if i + 1 < sizes.len() {
                    prop_assert_eq!(*size, limit);
                }
            }
        }
    }
}
