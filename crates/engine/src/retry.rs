//! Per-chunk retry state machine.
//!
//! ## States
//!
//! - `Attempting(remaining, attempt)`: start with the whole chunk at attempt 0.
//! - `Done(Completed)`: the store processed everything that was submitted.
//! - `Done(Exhausted)`: unprocessed items remained after `max_retries` retries.
//!   This is a **successful** terminal state; the leftover items are dropped.
//! - `Failed(error)`: the store call itself failed; surfaced immediately.
//!
//! After each successful call the pure [`RetryEngine::transition`] decides the
//! next state from the attempt number and the unprocessed remainder. Only the
//! remainder is resubmitted, after waiting `backoff.delay(attempt)` on the tokio
//! timer. The attempt counter belongs to one chunk and never resets mid-chunk.

use std::sync::Arc;
use std::time::Duration;

use betterbatch_core::{BatchError, RequestItems};
use tracing::{debug, warn};

use crate::accumulator::RowAccumulator;
use crate::backoff::Backoff;
use crate::chunker::{TableItems, total_items};
use crate::operation::ChunkOperation;

/// Retry state of one chunk while it is still being attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState<T> {
    remaining: RequestItems<T>,
    attempt: u32,
}

impl<T: TableItems> RetryState<T> {
    pub fn new(chunk: RequestItems<T>) -> Self {
        Self {
            remaining: chunk,
            attempt: 0,
        }
    }

    /// 0-based: 0 is the initial submission, n is the n-th retry.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn remaining(&self) -> &RequestItems<T> {
        &self.remaining
    }

    pub fn into_remaining(self) -> RequestItems<T> {
        self.remaining
    }
}

/// How a chunk ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Everything was processed. `attempts` counts store calls.
    Completed { attempts: u32 },
    /// Retries ran out with `dropped` items still unprocessed.
    Exhausted { attempts: u32, dropped: usize },
}

impl ChunkOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ChunkOutcome::Completed { attempts } | ChunkOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn dropped(&self) -> usize {
        match self {
            ChunkOutcome::Completed { .. } => 0,
            ChunkOutcome::Exhausted { dropped, .. } => *dropped,
        }
    }
}

/// Next step after a successful store call.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    /// Resubmit `next.remaining()` once `delay` has elapsed.
    Retry { next: RetryState<T>, delay: Duration },
    Done(ChunkOutcome),
}

/// Rows and outcome of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub rows: RowAccumulator,
    pub outcome: ChunkOutcome,
}

/// Drives a chunk through bounded resubmission of its unprocessed remainder.
#[derive(Clone)]
pub struct RetryEngine {
    max_retries: u32,
    backoff: Arc<dyn Backoff>,
}

impl std::fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryEngine")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    pub fn new(max_retries: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self { max_retries, backoff }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide what follows a successful call made at `attempt` that left
    /// `unprocessed` behind.
    pub fn transition<T: TableItems>(&self, attempt: u32, unprocessed: RequestItems<T>) -> Transition<T> {
        let attempts = attempt.saturating_add(1);
        let dropped = total_items(&unprocessed);

        if dropped == 0 {
            return Transition::Done(ChunkOutcome::Completed { attempts });
        }

        if attempt < self.max_retries {
            let next_attempt = attempt + 1;
            return Transition::Retry {
                next: RetryState {
                    remaining: unprocessed,
                    attempt: next_attempt,
                },
                delay: self.backoff.delay(next_attempt),
            };
        }

        Transition::Done(ChunkOutcome::Exhausted { attempts, dropped })
    }

    /// Run one chunk to a terminal state.
    ///
    /// Rows from every attempt are merged in the order the attempts returned
    /// them. A store error aborts the chunk at once and is returned with the
    /// chunk index and attempt number attached.
    pub async fn run<O>(&self, op: &O, chunk_index: usize, chunk: RequestItems<O::Items>) -> Result<ChunkResult, BatchError>
    where
        O: ChunkOperation + ?Sized,
    {
        let operation = op.kind();
        let mut rows = RowAccumulator::new();
        let mut state = RetryState::new(chunk);

        loop {
            let attempt = state.attempt();
            debug!(
                %operation,
                chunk = chunk_index,
                attempt,
                items = total_items(state.remaining()),
                "submitting chunk"
            );

            let response = op
                .submit(state.into_remaining())
                .await
                .map_err(|source| BatchError::Transport {
                    operation,
                    chunk: chunk_index,
                    attempt,
                    source,
                })?;

            rows.extend(response.rows);

            match self.transition(attempt, response.unprocessed) {
                Transition::Retry { next, delay } => {
                    warn!(
                        %operation,
                        chunk = chunk_index,
                        attempt = next.attempt(),
                        unprocessed = total_items(next.remaining()),
                        "unprocessed items returned, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    state = next;
                }
                Transition::Done(outcome) => {
                    if let ChunkOutcome::Exhausted { attempts, dropped } = outcome {
                        warn!(
                            %operation,
                            chunk = chunk_index,
                            attempts,
                            dropped,
                            "retries exhausted; giving up on unprocessed items"
                        );
                    }
                    return Ok(ChunkResult { rows, outcome });
                }
            }
        }
    }
}
