use alloy_primitives::Address;
use std::sync::Arc;
use tracing::{debug, info};

use super::{LedgerError, LedgerSource};
use crate::types::LedgerRecord;

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Walks every ledger record of a token with an `id_gt` cursor.
///
/// Pagination is all-or-nothing: any page error discards what was collected so
/// far, so a run never publishes a partial holder set.
pub struct LedgerPager {
    source: Arc<dyn LedgerSource>,
    page_size: usize,
}

impl LedgerPager {
    /// Creates a pager. A `page_size` of `0` is treated as `1`.
    #[must_use]
    pub fn new(source: Arc<dyn LedgerSource>, page_size: usize) -> Self {
        Self { source, page_size: page_size.max(1) }
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetches every record of `token`, in ascending id order.
    ///
    /// A page shorter than the page size ends pagination.
    ///
    /// # Errors
    ///
    /// Returns the first page error, or [`LedgerError::CursorStalled`] if the ledger
    /// returns a page whose ids do not advance past the cursor.
    pub async fn fetch_all(&self, token: Address) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut records = Vec::new();
        let mut cursor = String::new();
        let mut pages = 0usize;

        loop {
            let page = self.source.fetch_page(token, &cursor, self.page_size).await?;
            pages += 1;
            let page_len = page.len();

            if let Some(last) = page.last() {
                if !cursor.is_empty() && last.id.as_str() <= cursor.as_str() {
                    return Err(LedgerError::CursorStalled { cursor });
                }
                cursor.clone_from(&last.id);
            }
            records.extend(page);

            debug!(%token, page = pages, page_len, total = records.len(), "ledger page consumed");

            if page_len < self.page_size {
                break;
            }
        }

        info!(%token, pages, records = records.len(), "ledger pagination complete");
        Ok(records)
    }
}
