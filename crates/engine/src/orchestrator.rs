//! Public entry point: `BetterBatch`.
//!
//! Chunks a logical batch once, up front, then drives the chunks one at a time
//! through the retry engine. Chunk `i + 1` is not submitted until chunk `i` has
//! reached a terminal state, so at most one store call is in flight per
//! operation.
//!
//! ## Failure semantics
//!
//! - **Store error** on any chunk: the whole operation returns that error at
//!   once. Later chunks are never submitted and rows already merged are
//!   discarded.
//! - **Retry exhaustion** on a chunk: best effort. The operation carries on with
//!   the next chunk and still returns `Ok`; the unprocessed items are missing
//!   from the result (reads) or left unapplied (writes). `batch_get` and
//!   `batch_write` do not report this. Use the `*_with_report` variants to see
//!   how many items were dropped.

use std::sync::Arc;

use betterbatch_core::{
    BatchError, BatchGetRequest, BatchWriteRequest, Item, QueryRequest, RequestItems, StoreClient,
    TableRows,
};
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::accumulator::RowAccumulator;
use crate::backoff::{Backoff, ExponentialBackoff};
use crate::chunker::chunk_request_items;
use crate::config::{BatchConfig, ConfigError};
use crate::operation::{BatchGetOperation, BatchWriteOperation, ChunkOperation};
use crate::paginator::Paginator;
use crate::retry::RetryEngine;

/// Summary of one batch operation.
///
/// Reporting extension on top of the plain `batch_get` / `batch_write`
/// contract, which reports exhaustion the same as success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Chunks the request was split into.
    pub chunks: usize,
    /// Store calls made across all chunks, retries included.
    pub attempts: u32,
    /// Chunks that ran out of retries with items still unprocessed.
    pub exhausted_chunks: usize,
    /// Items given up on across all exhausted chunks.
    pub dropped_items: usize,
}

impl BatchReport {
    /// `true` when nothing was dropped to retry exhaustion.
    pub fn is_complete(&self) -> bool {
        self.dropped_items == 0
    }
}

/// Batch coordinator over a [`StoreClient`].
///
/// Holds only the client and immutable settings; every call owns its own
/// chunks, retry state and accumulator, so one instance can serve concurrent
/// callers.
#[derive(Debug, Clone)]
pub struct BetterBatch<C> {
    client: C,
    config: BatchConfig,
    retry: RetryEngine,
}

impl<C: StoreClient> BetterBatch<C> {
    /// Default settings: 10 retries, 100-key reads, 25-item writes,
    /// exponential backoff.
    pub fn new(client: C) -> Self {
        let config = BatchConfig::default();
        let retry = RetryEngine::new(config.max_retries, Arc::new(ExponentialBackoff::default()));
        Self { client, config, retry }
    }

    pub fn with_config(client: C, config: BatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let retry = RetryEngine::new(config.max_retries, Arc::new(ExponentialBackoff::default()));
        Ok(Self { client, config, retry })
    }

    /// Replace the backoff policy (any `Backoff`, including closures).
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.retry = RetryEngine::new(self.config.max_retries, Arc::new(backoff));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Read every key in `request`, however many, and return the rows per table.
    pub async fn batch_get(&self, request: BatchGetRequest) -> Result<TableRows, BatchError> {
        let (rows, _) = self.batch_get_with_report(request).await?;
        Ok(rows)
    }

    /// `batch_get` plus a [`BatchReport`].
    pub async fn batch_get_with_report(&self, request: BatchGetRequest) -> Result<(TableRows, BatchReport), BatchError> {
        let chunks = chunk_request_items(request.request_items, self.config.read_chunk_limit);
        let op = BatchGetOperation::new(&self.client);
        let (rows, report) = self.run_chunks(&op, chunks).await?;
        Ok((rows.into_rows(), report))
    }

    /// Apply every write in `request`, however many.
    pub async fn batch_write(&self, request: BatchWriteRequest) -> Result<(), BatchError> {
        self.batch_write_with_report(request).await?;
        Ok(())
    }

    /// `batch_write` plus a [`BatchReport`].
    pub async fn batch_write_with_report(&self, request: BatchWriteRequest) -> Result<BatchReport, BatchError> {
        let chunks = chunk_request_items(request.request_items, self.config.write_chunk_limit);
        let op = BatchWriteOperation::new(&self.client);
        let (_, report) = self.run_chunks(&op, chunks).await?;
        Ok(report)
    }

    /// Run a range query to completion, following continuation cursors.
    pub async fn query_all(&self, request: QueryRequest) -> Result<Vec<Item>, BatchError> {
        Paginator::new(&self.client).query_all(request).await
    }

    async fn run_chunks<O>(&self, op: &O, chunks: Vec<RequestItems<O::Items>>) -> Result<(RowAccumulator, BatchReport), BatchError>
    where
        O: ChunkOperation,
    {
        let operation = op.kind();
        let span = info_span!(
            "batch",
            op_id = %Uuid::now_v7(),
            %operation,
            chunks = chunks.len()
        );

        async move {
            let mut rows = RowAccumulator::new();
            let mut report = BatchReport {
                chunks: chunks.len(),
                ..BatchReport::default()
            };

            for (index, chunk) in chunks.into_iter().enumerate() {
                let result = self.retry.run(op, index, chunk).await?;

                report.attempts += result.outcome.attempts();
                if result.outcome.dropped() > 0 {
                    report.exhausted_chunks += 1;
                    report.dropped_items += result.outcome.dropped();
                }
                rows.append(result.rows);
            }

            if report.is_complete() {
                info!(
                    attempts = report.attempts,
                    rows = rows.row_count(),
                    "batch complete"
                );
            } else {
                warn!(
                    attempts = report.attempts,
                    rows = rows.row_count(),
                    exhausted_chunks = report.exhausted_chunks,
                    dropped_items = report.dropped_items,
                    "batch finished with items dropped after retry exhaustion"
                );
            }

            Ok((rows, report))
        }
        .instrument(span)
        .await
    }
}
