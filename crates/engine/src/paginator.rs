//! Cursor-following range queries.

use betterbatch_core::{BatchError, Item, QueryRequest, StoreClient};
use tracing::debug;

/// Issues single-page queries until the store stops returning a continuation
/// cursor.
///
/// Page failures are not retried: the first error aborts the loop and rows
/// from earlier pages are discarded.
#[derive(Debug)]
pub struct Paginator<'c, C: ?Sized> {
    client: &'c C,
}

impl<'c, C> Paginator<'c, C>
where
    C: StoreClient + ?Sized,
{
    pub fn new(client: &'c C) -> Self {
        Self { client }
    }

    /// Every row of the range, in page order.
    ///
    /// Starts from `request.exclusive_start_key`, so a caller can resume a
    /// range it partially consumed earlier.
    pub async fn query_all(&self, mut request: QueryRequest) -> Result<Vec<Item>, BatchError> {
        let mut items = Vec::new();
        let mut page = 0usize;

        loop {
            let output = self
                .client
                .query(request.clone())
                .await
                .map_err(|source| BatchError::Pagination { page, source })?;

            debug!(
                table = %request.table_name,
                page,
                rows = output.items.len(),
                has_more = output.has_more(),
                "query page fetched"
            );

            items.extend(output.items);

            match output.last_evaluated_key {
                Some(cursor) => {
                    request.exclusive_start_key = Some(cursor);
                    page += 1;
                }
                None => break,
            }
        }

        Ok(items)
    }
}
