use async_trait::async_trait;

use super::types::{FeedFilters, FeedMode, ResolvedItem};
use crate::api::ApiError;

/// Everything needed to build one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub mode: FeedMode,
    pub page: u32,
    pub filters: FeedFilters,
}

/// Where feed pages come from.
///
/// Fetching is split in two so the caller can check whether the result is
/// still wanted once the response has arrived and again once the body has
/// been parsed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Sends the request; resolves when the response status and headers are in.
    async fn open_page(&self, request: &PageRequest) -> Result<Box<dyn PageBody>, ApiError>;
}

/// One parsed page.
///
/// `raw` counts the records upstream sent, including any that were dropped
/// during normalization, so a page of unusable records is not mistaken for
/// the end of the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub raw: usize,
    pub items: Vec<ResolvedItem>,
}

impl FeedPage {
    /// A page where every record normalized.
    pub fn new(items: Vec<ResolvedItem>) -> Self {
        Self {
            raw: items.len(),
            items,
        }
    }

    /// Upstream sent no records at all.
    pub fn is_end(&self) -> bool {
        self.raw == 0
    }
}

/// A response whose body has not been read yet.
#[async_trait]
pub trait PageBody: Send {
    /// Reads and normalizes the records.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be read or is not a page object.
    async fn into_page(self: Box<Self>) -> Result<FeedPage, ApiError>;
}
