//! Batch coordination engine.
//!
//! Splits arbitrarily large batch reads/writes into store-legal chunks, drives
//! each chunk through a bounded retry loop that resubmits only the unprocessed
//! remainder, and follows continuation cursors until range queries are
//! exhausted.
//!
//! ## Components
//!
//! - `chunker`: partitions per-table request items into chunks of at most N items
//! - `backoff`: attempt number → delay
//! - `retry`: per-chunk retry state machine
//! - `orchestrator`: `BetterBatch`, the sequential chunk driver and public entry point
//! - `paginator`: cursor-following range query loop

pub mod accumulator;
pub mod backoff;
pub mod chunker;
pub mod config;
pub mod operation;
pub mod orchestrator;
pub mod paginator;
pub mod retry;

pub use accumulator::RowAccumulator;
pub use backoff::{Backoff, ExponentialBackoff};
pub use chunker::{TableItems, chunk_request_items, total_items};
pub use config::{BatchConfig, ConfigError};
pub use operation::{BatchGetOperation, BatchWriteOperation, ChunkOperation, ChunkResponse};
pub use orchestrator::{BatchReport, BetterBatch};
pub use paginator::Paginator;
pub use retry::{ChunkOutcome, ChunkResult, RetryEngine, RetryState, Transition};
