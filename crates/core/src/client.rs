//! The store collaborator boundary.

use std::sync::Arc;

use crate::error::StoreError;
use crate::output::{BatchGetOutput, BatchWriteOutput, QueryOutput};
use crate::request::{BatchGetRequest, BatchWriteRequest, QueryRequest};

/// Transport-level client of the remote key-value store.
///
/// These are the only three points of interaction the batch engine has with the
/// store. Each call is **bounded**: the store enforces a per-request item limit
/// (100 keys per read, 25 writes per write) and rejects larger requests with
/// `StoreError::Validation`.
///
/// ## Partial results
///
/// `batch_get` and `batch_write` may succeed while declining part of the
/// request. The declined part comes back as `unprocessed_keys` /
/// `unprocessed_items` and is the caller's to resubmit. That is a normal
/// success, not an error.
///
/// ## Implementation requirements
///
/// Implementations must be safe for sequential reuse. The engine never issues
/// two calls concurrently from one operation, but separate operations on the
/// same client may run concurrently.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Read up to the store's limit of keys, possibly across several tables.
    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetOutput, StoreError>;

    /// Apply up to the store's limit of puts/deletes, possibly across several tables.
    async fn batch_write(&self, request: BatchWriteRequest) -> Result<BatchWriteOutput, StoreError>;

    /// Fetch a single page of a range query.
    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError>;
}

#[async_trait::async_trait]
impl<C> StoreClient for Arc<C>
where
    C: StoreClient + ?Sized,
{
    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetOutput, StoreError> {
        (**self).batch_get(request).await
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> Result<BatchWriteOutput, StoreError> {
        (**self).batch_write(request).await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError> {
        (**self).query(request).await
    }
}

#[async_trait::async_trait]
impl<'a, C> StoreClient for &'a C
where
    C: StoreClient + ?Sized,
{
    async fn batch_get(&self, request: BatchGetRequest) -> Result<BatchGetOutput, StoreError> {
        (**self).batch_get(request).await
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> Result<BatchWriteOutput, StoreError> {
        (**self).batch_write(request).await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError> {
        (**self).query(request).await
    }
}
