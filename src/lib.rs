//! BananaView: a terminal browser for mod feeds.
//!
//! Four independently paged tracks (recommended, latest, updated,
//! subscriptions) are loaded through a [`feed::FeedController`] that
//! versions every load with an epoch, so results for a track the user has
//! already left are dropped. Items whose category is not in the listing are
//! resolved in the background by a [`resolution::BackoffPoller`] backed by a
//! write-once [`resolution::ResolutionCache`], and display strings pass
//! through a [`translation::TranslationOverlay`].

pub mod api;
pub mod app;
pub mod config;
pub mod feed;
pub mod resolution;
pub mod translation;
pub mod ui;
pub mod util;
