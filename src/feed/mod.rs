//! Feed tracks and the load-versioning controller.
//!
//! This module provides:
//! - **Types**: the normalized [`ResolvedItem`] and the user-facing enums
//!   (mode, content filter, thumbnail size, advisory display)
//! - **Tracks**: one independent list per [`FeedMode`], kept in memory while
//!   inactive so switching back is instant
//! - **Epochs**: [`LoadToken`]s that let late responses recognize they are no
//!   longer wanted
//! - **Controller**: mode switches, refresh, and infinite-scroll page loads

mod controller;
mod epoch;
mod source;
mod track;
mod types;
mod view;

pub use controller::{
    FeedController, ModeSwitch, PageOutcome, INITIAL_PLACEHOLDERS, MORE_PLACEHOLDERS,
    PAGES_PER_BATCH,
};
pub use epoch::{LoadEpoch, LoadToken};
pub use source::{FeedPage, FeedSource, PageBody, PageRequest};
pub use track::{FeedTrack, TrackSet, TrackSnapshot};
pub use types::{
    AdvisoryMode, Author, Category, ContentFilter, FeedFilters, FeedMode, ItemId, ItemKind,
    ItemStats, ResolvedItem, ThumbQuality,
};
pub use view::{FeedStatus, FeedView};
