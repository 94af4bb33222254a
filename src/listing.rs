//! Incremental "load more" pagination over the CMS post listing.

use tracing::{debug, warn};

use crate::cms::ContentSource;
use crate::error::Result;
use crate::models::{PostListPage, PostSummary};

/// Posts shown so far plus the cursor of the next page.
///
/// Append-only: pages are concatenated in fetch order, never sorted or
/// deduplicated. A `None` cursor means the listing is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingState {
    accumulated: Vec<PostSummary>,
    cursor: Option<String>,
}

impl ListingState {
    pub fn from_first_page(page: PostListPage) -> Self {
        Self::default().append_page(page)
    }

    pub fn append_page(mut self, page: PostListPage) -> Self {
        self.accumulated.extend(page.items);
        self.cursor = page.next_cursor;
        self
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.accumulated
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Fetches the page behind the cursor and appends it, returning how many
    /// posts were added. On failure the state is left exactly as it was.
    pub async fn load_more(&mut self, source: &dyn ContentSource) -> Result<usize> {
        let Some(cursor) = self.cursor.as_deref() else {
            return Ok(0);
        };

        let page = source.fetch_page(cursor).await.map_err(|e| {
            warn!(cursor, error = %e, "Failed to load next listing page");
            e
        })?;

        let added = page.items.len();
        *self = std::mem::take(self).append_page(page);
        debug!(added, total = self.accumulated.len(), "Listing page appended");
        Ok(added)
    }
}

/// Walks every page from the first one to the end.
pub async fn collect_all(
    source: &dyn ContentSource,
    doc_type: &str,
    page_size: u32,
) -> Result<Vec<PostListPage>> {
    let mut pages = vec![source.query_by_type(doc_type, page_size).await?];
    while let Some(cursor) = pages.last().and_then(|p| p.next_cursor.clone()) {
        pages.push(source.fetch_page(&cursor).await?);
    }
    Ok(pages)
}
