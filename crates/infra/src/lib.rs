//! Infrastructure adapters: store clients.

pub mod store;

pub use store::{CallCounts, InMemoryStore, KeyValue, StoreLimits, TableSchema};
