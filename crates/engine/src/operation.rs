//! Chunk-level adapters over the store's batch primitives.
//!
//! A [`ChunkOperation`] bundles the two operation-specific pieces the retry loop
//! needs: how to submit a chunk, and how to read the returned rows and the
//! unprocessed remainder out of the store's response.

use betterbatch_core::{
    BatchGetOutput, BatchGetRequest, BatchOperationKind, BatchWriteOutput, BatchWriteRequest,
    KeysAndAttributes, RequestItems, StoreClient, StoreError, TableRows, WriteRequest,
};

use crate::chunker::{TableItems, total_items};

/// Normalized result of submitting one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResponse<T> {
    /// Rows returned by this call (always empty for writes).
    pub rows: TableRows,
    /// Items the store declined; tables with no items are dropped.
    pub unprocessed: RequestItems<T>,
}

impl<T: TableItems> ChunkResponse<T> {
    pub fn new(rows: TableRows, unprocessed: RequestItems<T>) -> Self {
        let unprocessed = unprocessed
            .into_iter()
            .filter(|(_, items)| items.item_count() > 0)
            .collect();
        Self { rows, unprocessed }
    }

    pub fn unprocessed_count(&self) -> usize {
        total_items(&self.unprocessed)
    }
}

impl From<BatchGetOutput> for ChunkResponse<KeysAndAttributes> {
    fn from(output: BatchGetOutput) -> Self {
        Self::new(output.responses, output.unprocessed_keys)
    }
}

impl From<BatchWriteOutput> for ChunkResponse<Vec<WriteRequest>> {
    fn from(output: BatchWriteOutput) -> Self {
        Self::new(TableRows::new(), output.unprocessed_items)
    }
}

/// One bounded store call, generic over the per-table item collection.
#[async_trait::async_trait]
pub trait ChunkOperation: Send + Sync {
    type Items: TableItems;

    fn kind(&self) -> BatchOperationKind;

    async fn submit(&self, chunk: RequestItems<Self::Items>) -> Result<ChunkResponse<Self::Items>, StoreError>;
}

/// Submits chunks through `StoreClient::batch_get`.
#[derive(Debug)]
pub struct BatchGetOperation<'c, C: ?Sized> {
    client: &'c C,
}

impl<'c, C: ?Sized> BatchGetOperation<'c, C> {
    pub fn new(client: &'c C) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl<'c, C> ChunkOperation for BatchGetOperation<'c, C>
where
    C: StoreClient + ?Sized,
{
    type Items = KeysAndAttributes;

    fn kind(&self) -> BatchOperationKind {
        BatchOperationKind::BatchGet
    }

    async fn submit(&self, chunk: RequestItems<KeysAndAttributes>) -> Result<ChunkResponse<KeysAndAttributes>, StoreError> {
        let output = self.client.batch_get(BatchGetRequest::from_items(chunk)).await?;
        Ok(output.into())
    }
}

/// Submits chunks through `StoreClient::batch_write`.
#[derive(Debug)]
pub struct BatchWriteOperation<'c, C: ?Sized> {
    client: &'c C,
}

impl<'c, C: ?Sized> BatchWriteOperation<'c, C> {
    pub fn new(client: &'c C) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl<'c, C> ChunkOperation for BatchWriteOperation<'c, C>
where
    C: StoreClient + ?Sized,
{
    type Items = Vec<WriteRequest>;

    fn kind(&self) -> BatchOperationKind {
        BatchOperationKind::BatchWrite
    }

    async fn submit(&self, chunk: RequestItems<Vec<WriteRequest>>) -> Result<ChunkResponse<Vec<WriteRequest>>, StoreError> {
        let output = self.client.batch_write(BatchWriteRequest::from_items(chunk)).await?;
        Ok(output.into())
    }
}
