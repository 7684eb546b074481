use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use betterbatch_core::{
    BatchGetOutput, BatchGetRequest, BatchWriteOutput, BatchWriteRequest, Item, QueryOutput,
    QueryRequest, RequestItems, StoreClient, StoreError, TableName, TableRows, WriteRequest,
};
use serde::Serialize;
use tracing::trace;

use super::key::{KeyValue, StoredKey, TableSchema, sort_condition_matches};

/// Hard per-request limits enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_get_keys: usize,
    pub max_write_items: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_get_keys: 100,
            max_write_items: 25,
        }
    }
}

/// Calls received per primitive operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    pub batch_get: u64,
    pub batch_write: u64,
    pub query: u64,
}

impl CallCounts {
    pub fn total(&self) -> u64 {
        self.batch_get + self.batch_write + self.query
    }
}

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    items: BTreeMap<StoredKey, Item>,
}

/// In-memory key-value store.
///
/// Intended for tests/dev. Behaves like a remote store where it matters to
/// batch callers:
///
/// - requests above `StoreLimits` are rejected with `StoreError::Validation`
/// - `with_item_budget(n)` caps the items processed per batch call; the rest
///   come back as unprocessed, the way a throttled store answers
/// - `fail_on_call(n, err)` makes the n-th call (1-based, across all
///   operations) fail with `err`
/// - queries are paged at `with_page_size(n)` rows
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<BTreeMap<TableName, Table>>,
    limits: StoreLimits,
    item_budget: Option<usize>,
    page_size: usize,
    failures: Mutex<BTreeMap<u64, StoreError>>,
    total_calls: AtomicU64,
    get_calls: AtomicU64,
    write_calls: AtomicU64,
    query_calls: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::internal("lock poisoned")
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            limits: StoreLimits::default(),
            item_budget: None,
            page_size: 100,
            failures: Mutex::new(BTreeMap::new()),
            total_calls: AtomicU64::new(0),
            get_calls: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
            query_calls: AtomicU64::new(0),
        }
    }

    /// Register a table. Ownership rules out concurrent access, so a
    /// poisoned lock is recovered rather than reported.
    pub fn with_table(mut self, name: impl Into<TableName>, schema: TableSchema) -> Self {
        let tables = self
            .tables
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        tables.insert(
            name.into(),
            Table {
                schema,
                items: BTreeMap::new(),
            },
        );
        self
    }

    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Process at most `budget` items per batch call.
    pub fn with_item_budget(mut self, budget: usize) -> Self {
        self.item_budget = Some(budget);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fail the `call`-th primitive call (1-based, all operations) with `error`.
    pub fn fail_on_call(&self, call: u64, error: StoreError) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().map_err(|_| poisoned())?;
        failures.insert(call, error);
        Ok(())
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            batch_get: self.get_calls.load(Ordering::SeqCst),
            batch_write: self.write_calls.load(Ordering::SeqCst),
            query: self.query_calls.load(Ordering::SeqCst),
        }
    }

    /// Insert or replace an item directly, bypassing batch limits.
    pub fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let table = lookup_mut(&mut tables, table)?;
        let key = table.schema.key_of(&item)?;
        table.items.insert(key, item);
        Ok(())
    }

    pub fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let table = lookup(&tables, table)?;
        let key = table.schema.parse_key(key)?;
        Ok(table.items.get(&key).cloned())
    }

    pub fn item_count(&self, table: &str) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(lookup(&tables, table)?.items.len())
    }

    /// Count the call and return the injected failure for it, if any.
    fn begin_call(&self, counter: &AtomicU64) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let call = self.total_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut failures = self.failures.lock().map_err(|_| poisoned())?;
        match failures.remove(&call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn budget(&self) -> usize {
        self.item_budget.unwrap_or(usize::MAX)
    }
}

fn lookup<'t>(tables: &'t BTreeMap<TableName, Table>, name: &str) -> Result<&'t Table, StoreError> {
    tables
        .get(name)
        .ok_or_else(|| StoreError::ResourceNotFound(format!("table '{name}'")))
}

fn lookup_mut<'t>(tables: &'t mut BTreeMap<TableName, Table>, name: &str) -> Result<&'t mut Table, StoreError> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::ResourceNotFound(format!("table '{name}'")))
}

/// Keep only the attributes named in a comma-separated projection, resolving
/// `#placeholder` names.
fn project(item: &Item, expression: &str, names: Option<&BTreeMap<String, String>>) -> Item {
    expression
        .split(',')
        .map(str::trim)
        .filter(|attr| !attr.is_empty())
        .map(|attr| {
            names
                .and_then(|names| names.get(attr))
                .map(String::as_str)
                .unwrap_or(attr)
        })
        .filter_map(|attr| item.get(attr).map(|v| (attr.to_string(), v.clone())))
        .collect()
}

#[async_trait::async_trait]
impl StoreClient for InMemoryStore {
    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetOutput, StoreError> {
        self.begin_call(&self.get_calls)?;

        let requested = request.item_count();
        if requested == 0 {
            return Err(StoreError::validation("batch get must request at least one key"));
        }
        if requested > self.limits.max_get_keys {
            return Err(StoreError::validation(format!(
                "batch get requested {requested} keys, limit is {}",
                self.limits.max_get_keys
            )));
        }

        let tables = self.tables.read().map_err(|_| poisoned())?;

        // Validate the whole request before reading anything.
        let mut parsed = Vec::with_capacity(request.request_items.len());
        for (name, keys) in &request.request_items {
            let table = lookup(&tables, name.as_str())?;
            let stored_keys = keys
                .keys
                .iter()
                .map(|key| table.schema.parse_key(key))
                .collect::<Result<Vec<_>, _>>()?;
            parsed.push((name, keys, table, stored_keys));
        }

        let mut budget = self.budget();
        let mut responses = TableRows::new();
        let mut unprocessed = RequestItems::new();

        for (name, keys, table, stored_keys) in parsed {
            let take = budget.min(stored_keys.len());
            budget -= take;

            if take > 0 {
                let rows = responses.entry(name.clone()).or_insert_with(Vec::new);
                for stored_key in &stored_keys[..take] {
                    if let Some(item) = table.items.get(stored_key) {
                        let row = match &keys.projection_expression {
                            Some(expression) => {
                                project(item, expression, keys.expression_attribute_names.as_ref())
                            }
                            None => item.clone(),
                        };
                        rows.push(row);
                    }
                }
            }

            if take < keys.keys.len() {
                unprocessed.insert(name.clone(), keys.with_keys(keys.keys[take..].to_vec()));
            }
        }

        trace!(
            requested,
            unprocessed = unprocessed.values().map(|k| k.keys.len()).sum::<usize>(),
            "in-memory batch get"
        );

        Ok(BatchGetOutput {
            responses,
            unprocessed_keys: unprocessed,
        })
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> Result<BatchWriteOutput, StoreError> {
        self.begin_call(&self.write_calls)?;

        let requested = request.item_count();
        if requested == 0 {
            return Err(StoreError::validation("batch write must contain at least one request"));
        }
        if requested > self.limits.max_write_items {
            return Err(StoreError::validation(format!(
                "batch write contained {requested} requests, limit is {}",
                self.limits.max_write_items
            )));
        }

        let mut tables = self.tables.write().map_err(|_| poisoned())?;

        // Validate everything first: unknown tables, bad keys, duplicates.
        let mut keyed = Vec::with_capacity(request.request_items.len());
        for (name, writes) in &request.request_items {
            let table = lookup(&tables, name.as_str())?;
            let mut seen = BTreeSet::new();
            let mut keys = Vec::with_capacity(writes.len());
            for write in writes {
                let key = match write {
                    WriteRequest::Put { item } => table.schema.key_of(item)?,
                    WriteRequest::Delete { key } => table.schema.parse_key(key)?,
                };
                if !seen.insert(key.clone()) {
                    return Err(StoreError::validation(format!(
                        "batch write contains duplicate keys for table '{name}'"
                    )));
                }
                keys.push(key);
            }
            keyed.push(keys);
        }

        let mut budget = self.budget();
        let mut unprocessed = RequestItems::new();

        for ((name, writes), keys) in request.request_items.into_iter().zip(keyed) {
            let take = budget.min(writes.len());
            budget -= take;

            let table = lookup_mut(&mut tables, name.as_str())?;
            let mut writes = writes;
            let rest = writes.split_off(take);

            for (write, key) in writes.into_iter().zip(keys) {
                match write {
                    WriteRequest::Put { item } => {
                        table.items.insert(key, item);
                    }
                    WriteRequest::Delete { .. } => {
                        table.items.remove(&key);
                    }
                }
            }

            if !rest.is_empty() {
                unprocessed.insert(name, rest);
            }
        }

        trace!(
            requested,
            unprocessed = unprocessed.values().map(Vec::len).sum::<usize>(),
            "in-memory batch write"
        );

        Ok(BatchWriteOutput {
            unprocessed_items: unprocessed,
        })
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError> {
        self.begin_call(&self.query_calls)?;

        if request.index_name.is_some() {
            return Err(StoreError::validation("secondary indexes are not supported"));
        }

        let tables = self.tables.read().map_err(|_| poisoned())?;
        let table = lookup(&tables, request.table_name.as_str())?;
        let schema = &table.schema;

        let condition = &request.key_condition;
        if condition.partition_key != schema.partition_key {
            return Err(StoreError::validation(format!(
                "key condition must target partition key '{}'",
                schema.partition_key
            )));
        }
        let partition = KeyValue::from_json(&condition.partition_value)
            .ok_or_else(|| StoreError::validation("partition value must be a string or number"))?;

        let sort_condition = match (&condition.sort, &schema.sort_key) {
            (None, _) => None,
            (Some((name, cond)), Some(sort_key)) if name == sort_key => Some(cond),
            (Some((name, _)), _) => {
                return Err(StoreError::validation(format!("'{name}' is not the table's sort key")));
            }
        };

        let start = match &request.exclusive_start_key {
            Some(key) => Some(schema.parse_key(key)?),
            None => None,
        };

        let mut matching = Vec::new();
        for (key, item) in &table.items {
            if key.0 != partition {
                continue;
            }
            if let (Some(cond), Some(sort)) = (sort_condition, &key.1) {
                if !sort_condition_matches(cond, sort)? {
                    continue;
                }
            }
            matching.push((key, item));
        }
        if !request.scan_index_forward {
            matching.reverse();
        }

        let after_cursor: Vec<_> = matching
            .into_iter()
            .filter(|(key, _)| match &start {
                None => true,
                Some(start) if request.scan_index_forward => *key > start,
                Some(start) => *key < start,
            })
            .collect();

        let page_size = request.limit.unwrap_or(self.page_size).min(self.page_size).max(1);
        let has_more = after_cursor.len() > page_size;

        let items: Vec<Item> = after_cursor
            .iter()
            .take(page_size)
            .map(|(_, item)| match &request.projection_expression {
                Some(expression) => project(item, expression, None),
                None => (*item).clone(),
            })
            .collect();

        let last_evaluated_key = if has_more {
            after_cursor
                .get(page_size - 1)
                .map(|(_, item)| schema.key_attributes(item))
        } else {
            None
        };

        Ok(QueryOutput {
            items,
            last_evaluated_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use betterbatch_core::{KeyCondition, KeysAndAttributes, SortKeyCondition};
    use serde_json::{Value as JsonValue, json};

    use super::*;

    fn item(value: JsonValue) -> Item {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn user(id: u32) -> Item {
        item(json!({ "id": id, "name": format!("user-{id}") }))
    }

    fn user_key(id: u32) -> Item {
        item(json!({ "id": id }))
    }

    fn users_store() -> InMemoryStore {
        InMemoryStore::new().with_table("users", TableSchema::new("id"))
    }

    fn events_store() -> InMemoryStore {
        let store = InMemoryStore::new()
            .with_table("events", TableSchema::new("pk").with_sort_key("sk"))
            .with_page_size(2);
        for sk in 1..=5 {
            store
                .put_item("events", item(json!({ "pk": "a", "sk": sk, "kind": "click" })))
                .unwrap();
        }
        store
            .put_item("events", item(json!({ "pk": "b", "sk": 1, "kind": "view" })))
            .unwrap();
        store
    }

    fn sks(items: &[Item]) -> Vec<i64> {
        items.iter().map(|i| i["sk"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let store = users_store();
        let writes = BatchWriteRequest::new().with_table("users", (1..=3).map(|i| WriteRequest::put(user(i))).collect());

        let out = store.batch_write(writes).await.unwrap();
        assert!(out.unprocessed_items.is_empty());

        let get = BatchGetRequest::new().with_table(
            "users",
            KeysAndAttributes::new(vec![user_key(1), user_key(3), user_key(9)]),
        );
        let out = store.batch_get(get).await.unwrap();

        assert_eq!(out.responses["users"], vec![user(1), user(3)]);
        assert!(out.unprocessed_keys.is_empty());
    }

    #[tokio::test]
    async fn rejects_requests_over_limits() {
        let store = users_store();

        let writes = BatchWriteRequest::new().with_table("users", (0..26).map(|i| WriteRequest::put(user(i))).collect());
        assert!(matches!(store.batch_write(writes).await, Err(StoreError::Validation(_))));

        let get = BatchGetRequest::new().with_table("users", KeysAndAttributes::new((0..101).map(user_key).collect()));
        assert!(matches!(store.batch_get(get).await, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_keys_in_one_write_are_rejected() {
        let store = users_store();
        let writes = BatchWriteRequest::new().with_table(
            "users",
            vec![WriteRequest::put(user(1)), WriteRequest::delete(user_key(1))],
        );

        assert!(matches!(store.batch_write(writes).await, Err(StoreError::Validation(_))));
        assert_eq!(store.item_count("users").unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_table_is_not_found() {
        let store = users_store();
        let get = BatchGetRequest::new().with_table("nope", KeysAndAttributes::new(vec![user_key(1)]));
        assert!(matches!(store.batch_get(get).await, Err(StoreError::ResourceNotFound(_))));
    }

    #[tokio::test]
    async fn item_budget_returns_remainder_as_unprocessed() {
        let store = users_store().with_item_budget(2);
        let writes = BatchWriteRequest::new().with_table("users", (1..=5).map(|i| WriteRequest::put(user(i))).collect());

        let out = store.batch_write(writes).await.unwrap();

        assert_eq!(store.item_count("users").unwrap(), 2);
        assert_eq!(
            out.unprocessed_items["users"],
            (3..=5).map(|i| WriteRequest::put(user(i))).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn unprocessed_keys_keep_read_options() {
        let store = users_store().with_item_budget(1);
        for i in 1..=2 {
            store.put_item("users", user(i)).unwrap();
        }
        let get = BatchGetRequest::new().with_table(
            "users",
            KeysAndAttributes::new(vec![user_key(1), user_key(2)])
                .with_projection("#n")
                .with_attribute_name("#n", "name"),
        );

        let out = store.batch_get(get).await.unwrap();

        assert_eq!(out.responses["users"], vec![item(json!({ "name": "user-1" }))]);
        let remainder = &out.unprocessed_keys["users"];
        assert_eq!(remainder.keys, vec![user_key(2)]);
        assert_eq!(remainder.projection_expression.as_deref(), Some("#n"));
    }

    #[tokio::test]
    async fn delete_removes_item() {
        let store = users_store();
        store.put_item("users", user(1)).unwrap();

        let writes = BatchWriteRequest::new().with_table("users", vec![WriteRequest::delete(user_key(1))]);
        store.batch_write(writes).await.unwrap();

        assert_eq!(store.get_item("users", &user_key(1)).unwrap(), None);
    }

    #[tokio::test]
    async fn injected_failure_hits_the_numbered_call() {
        let store = users_store();
        store
            .fail_on_call(2, StoreError::Throttled("slow down".to_string()))
            .unwrap();
        let get = || BatchGetRequest::new().with_table("users", KeysAndAttributes::new(vec![user_key(1)]));

        assert!(store.batch_get(get()).await.is_ok());
        assert_eq!(
            store.batch_get(get()).await,
            Err(StoreError::Throttled("slow down".to_string()))
        );
        assert!(store.batch_get(get()).await.is_ok());
        assert_eq!(store.calls().batch_get, 3);
    }

    #[tokio::test]
    async fn query_pages_with_cursor() {
        let store = events_store();
        let request = QueryRequest::new("events", KeyCondition::partition("pk", "a"));

        let first = store.query(request.clone()).await.unwrap();
        assert_eq!(sks(&first.items), vec![1, 2]);
        assert_eq!(first.last_evaluated_key, Some(item(json!({ "pk": "a", "sk": 2 }))));

        let mut next = request.clone();
        next.exclusive_start_key = first.last_evaluated_key;
        let second = store.query(next).await.unwrap();
        assert_eq!(sks(&second.items), vec![3, 4]);

        let mut last = request;
        last.exclusive_start_key = second.last_evaluated_key;
        let third = store.query(last).await.unwrap();
        assert_eq!(sks(&third.items), vec![5]);
        assert!(!third.has_more());
    }

    #[tokio::test]
    async fn query_sort_conditions_and_direction() {
        let store = events_store().with_page_size(10);
        let request = QueryRequest::new(
            "events",
            KeyCondition::partition("pk", "a").with_sort("sk", SortKeyCondition::Between(json!(2), json!(4))),
        )
        .descending();

        let out = store.query(request).await.unwrap();

        assert_eq!(sks(&out.items), vec![4, 3, 2]);
        assert_eq!(out.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn query_rejects_wrong_partition_key() {
        let store = events_store();
        let request = QueryRequest::new("events", KeyCondition::partition("kind", "click"));
        assert!(matches!(store.query(request).await, Err(StoreError::Validation(_))));
    }

    #[test]
    fn fault_injection_reports_poisoned_lock() {
        let store = users_store();
        std::thread::scope(|scope| {
            let poisoner = scope.spawn(|| {
                let _guard = store.failures.lock().unwrap();
                panic!("poison the failure table");
            });
            assert!(poisoner.join().is_err());
        });

        let err = store
            .fail_on_call(1, StoreError::Throttled("slow down".to_string()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[test]
    fn table_registration_survives_poisoned_lock() {
        let store = InMemoryStore::new();
        std::thread::scope(|scope| {
            let poisoner = scope.spawn(|| {
                let _guard = store.tables.write().unwrap();
                panic!("poison the table map");
            });
            assert!(poisoner.join().is_err());
        });

        let mut store = store.with_table("users", TableSchema::new("id"));

        let tables = store.tables.get_mut().unwrap_or_else(PoisonError::into_inner);
        assert!(tables.contains_key("users"));
    }
}
