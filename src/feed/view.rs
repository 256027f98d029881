use super::types::{ItemId, ResolvedItem};
use crate::resolution::CategoryInfo;

/// Footer state of the visible list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedStatus {
    #[default]
    Idle,
    Loading,
    /// No more pages.
    Exhausted,
    /// The last page request failed; scrolling again retries it.
    Failed(String),
}

/// Rendering side of the feed.
///
/// The controller calls these from inside its critical sections, so
/// implementations must not block and must not call back into the
/// controller.
pub trait FeedView: Send + Sync {
    fn clear(&self);
    fn set_title(&self, title: &str);
    fn show_placeholders(&self, count: usize);
    fn clear_placeholders(&self);
    fn append(&self, items: &[ResolvedItem]);
    fn set_status(&self, status: FeedStatus);
    /// Current scroll position of the visible list.
    fn scroll_offset(&self) -> usize;
    fn restore_scroll(&self, offset: usize);
    /// A visible item's category settled. No-op for unknown ids.
    fn update_item(&self, id: ItemId, info: Option<&CategoryInfo>);
}
