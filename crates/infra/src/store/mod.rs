//! `StoreClient` implementations.
//!
//! Only an in-memory store lives here for now. It honours the same hard limits
//! and partial-result behaviour as a remote store, which makes it suitable for
//! tests and local development of code built on the batch engine.

pub mod in_memory;
pub mod key;

pub use in_memory::{CallCounts, InMemoryStore, StoreLimits};
pub use key::{KeyValue, TableSchema};
