//! Error model.
//!
//! Two layers:
//!
//! - [`StoreError`]: a failure reported by the store collaborator itself
//!   (connectivity, throttling surfaced as an error, malformed request,
//!   authorization).
//! - [`BatchError`]: what batch and query operations surface to callers. Every
//!   variant wraps a `StoreError` and adds where it happened.
//!
//! Unprocessed items that survive all retries are **not** an error. A batch call
//! that gives up on part of a chunk still returns `Ok`; the dropped items are
//! simply absent from the result.

use thiserror::Error;

/// Failure reported by the store for a single primitive call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the connection dropped mid-call.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// The store rejected the call outright because of throughput limits.
    #[error("throttled: {0}")]
    Throttled(String),

    /// The request was malformed or exceeded a hard limit.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Store-side failure not covered above.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Which batch primitive a chunk was submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOperationKind {
    BatchGet,
    BatchWrite,
}

impl BatchOperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOperationKind::BatchGet => "batch_get",
            BatchOperationKind::BatchWrite => "batch_write",
        }
    }
}

impl core::fmt::Display for BatchOperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by batch and query operations.
///
/// Always fatal to the enclosing operation: no later chunk or page is attempted
/// once one of these is produced, and partially accumulated rows are discarded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    /// A chunk submission failed. `chunk` is the 0-based chunk index, `attempt`
    /// the 0-based retry attempt within that chunk.
    #[error("{operation} failed on chunk {chunk} (attempt {attempt}): {source}")]
    Transport {
        operation: BatchOperationKind,
        chunk: usize,
        attempt: u32,
        #[source]
        source: StoreError,
    },

    /// A page of a range query failed. `page` is 0-based.
    #[error("query failed on page {page}: {source}")]
    Pagination {
        page: usize,
        #[source]
        source: StoreError,
    },
}

impl BatchError {
    /// The underlying store failure.
    pub fn store_error(&self) -> &StoreError {
        match self {
            BatchError::Transport { source, .. } | BatchError::Pagination { source, .. } => source,
        }
    }
}
