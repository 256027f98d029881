use super::types::{FeedMode, ItemId, ResolvedItem};

/// Per-mode list state. Items keep the order they were fetched in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTrack {
    pub items: Vec<ResolvedItem>,
    /// Next page to request. Starts at 1 and only moves on a successful,
    /// non-empty page.
    pub page: u32,
    /// Upstream returned an empty page; no more fetches until a reset.
    pub exhausted: bool,
    /// Scroll position saved when the track was last deactivated.
    pub scroll_offset: usize,
}

impl Default for FeedTrack {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            exhausted: false,
            scroll_offset: 0,
        }
    }
}

impl FeedTrack {
    /// Back to a fresh, never-fetched track.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn find_mut(&mut self, id: ItemId) -> impl Iterator<Item = &mut ResolvedItem> {
        self.items.iter_mut().filter(move |item| item.id == id)
    }
}

/// Read-only copy of a track for rendering and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub mode: FeedMode,
    pub items: Vec<ResolvedItem>,
    pub page: u32,
    pub exhausted: bool,
    pub scroll_offset: usize,
}

/// One [`FeedTrack`] per [`FeedMode`].
#[derive(Debug, Default)]
pub struct TrackSet {
    tracks: [FeedTrack; 4],
}

impl TrackSet {
    pub fn get(&self, mode: FeedMode) -> &FeedTrack {
        &self.tracks[mode.index()]
    }

    pub fn get_mut(&mut self, mode: FeedMode) -> &mut FeedTrack {
        &mut self.tracks[mode.index()]
    }

    pub fn reset_all(&mut self) {
        self.tracks.iter_mut().for_each(FeedTrack::reset);
    }

    pub fn snapshot(&self, mode: FeedMode) -> TrackSnapshot {
        let track = self.get(mode);
        TrackSnapshot {
            mode,
            items: track.items.clone(),
            page: track.page,
            exhausted: track.exhausted,
            scroll_offset: track.scroll_offset,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FeedMode, &mut FeedTrack)> {
        FeedMode::ALL.into_iter().zip(self.tracks.iter_mut())
    }
}
