use std::sync::Arc;

use parking_lot::Mutex;

use super::epoch::{LoadEpoch, LoadToken};
use super::source::{FeedSource, PageRequest};
use super::track::{TrackSet, TrackSnapshot};
use super::types::{Category, FeedFilters, FeedMode, ItemId, ResolvedItem};
use super::view::{FeedStatus, FeedView};
use crate::api::ApiError;
use crate::resolution::{BackoffPoller, CategoryInfo, ResolutionSink};
use crate::translation::TranslationOverlay;

/// Pages fetched back to back per batch.
pub const PAGES_PER_BATCH: usize = 3;
/// Placeholder cards shown while the first page of a fresh track loads.
pub const INITIAL_PLACEHOLDERS: usize = 8;
/// Placeholder cards shown while a follow-up page loads.
pub const MORE_PLACEHOLDERS: usize = 4;

/// What `set_mode` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSwitch {
    /// Mode was already showing with items; nothing changed.
    AlreadyActive,
    /// Track had items in memory and was redrawn from them.
    Restored,
    /// Track is empty; run `load_pages(true, token)`.
    Load(LoadToken),
}

/// Result of a single page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page accepted; carries the number of usable items, which may be zero.
    Appended(usize),
    /// Upstream had nothing more (or the track was already at its end).
    Exhausted,
    /// Request failed; the page cursor did not move.
    Failed,
    /// Another load held the loading flag.
    Skipped,
    /// A mode switch or refresh happened meanwhile; result discarded.
    Stale,
}

#[derive(Debug)]
struct FeedState {
    epoch: LoadEpoch,
    active: FeedMode,
    /// Epoch of the load currently holding the flag.
    loading: Option<u64>,
    tracks: TrackSet,
    filters: FeedFilters,
}

impl FeedState {
    fn still_valid(&self, token: &LoadToken) -> bool {
        self.epoch.is_current(token) && token.mode() == self.active
    }
}

struct Shared {
    state: Mutex<FeedState>,
    view: Arc<dyn FeedView>,
    overlay: Arc<TranslationOverlay>,
}

impl Shared {
    fn translated_info(&self, info: &CategoryInfo) -> CategoryInfo {
        CategoryInfo::new(
            self.overlay.translate_category(&info.name),
            info.category_id,
        )
    }
}

/// Delivers poller outcomes into every track holding the item, and to the
/// view when the item is on screen.
struct TrackRelay {
    shared: Arc<Shared>,
}

impl ResolutionSink for TrackRelay {
    fn update_item(&self, id: ItemId, info: Option<&CategoryInfo>) {
        let translated = info.map(|i| self.shared.translated_info(i));

        let mut state = self.shared.state.lock();
        let active = state.active;
        let mut visible = false;
        for (mode, track) in state.tracks.iter_mut() {
            for item in track.find_mut(id) {
                if item.settle_category(translated.as_ref()) && mode == active {
                    visible = true;
                }
            }
        }
        if visible {
            self.shared.view.update_item(id, translated.as_ref());
        }
    }
}

/// Owns the per-mode tracks and serializes every load against the current
/// epoch.
///
/// Each step of a load checks its [`LoadToken`], then mutates and renders
/// inside one critical section, so once a newer mode switch or refresh has
/// cleared the view nothing from an older load can reach it. The state lock
/// is never held across an await.
#[derive(Clone)]
pub struct FeedController {
    shared: Arc<Shared>,
    source: Arc<dyn FeedSource>,
    poller: BackoffPoller,
}

impl FeedController {
    /// Builds the controller and routes the poller's outcomes through it.
    pub fn new(
        source: Arc<dyn FeedSource>,
        poller: BackoffPoller,
        view: Arc<dyn FeedView>,
        overlay: Arc<TranslationOverlay>,
        filters: FeedFilters,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(FeedState {
                epoch: LoadEpoch::default(),
                active: FeedMode::default(),
                loading: None,
                tracks: TrackSet::default(),
                filters,
            }),
            view,
            overlay,
        });
        poller.set_sink(Arc::new(TrackRelay {
            shared: Arc::clone(&shared),
        }));
        Self {
            shared,
            source,
            poller,
        }
    }

    pub fn poller(&self) -> &BackoffPoller {
        &self.poller
    }

    pub fn overlay(&self) -> &Arc<TranslationOverlay> {
        &self.shared.overlay
    }

    pub fn active_mode(&self) -> FeedMode {
        self.shared.state.lock().active
    }

    pub fn filters(&self) -> FeedFilters {
        self.shared.state.lock().filters.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().loading.is_some()
    }

    pub fn current_token(&self) -> LoadToken {
        let state = self.shared.state.lock();
        state.epoch.token(state.active)
    }

    /// Whether a continuation holding `token` may still touch state.
    pub fn still_valid(&self, token: &LoadToken) -> bool {
        self.shared.state.lock().still_valid(token)
    }

    pub fn snapshot(&self, mode: FeedMode) -> TrackSnapshot {
        self.shared.state.lock().tracks.snapshot(mode)
    }

    /// Makes `mode` the visible track.
    ///
    /// Starting a switch invalidates every in-flight load. A track with
    /// items in memory is redrawn from them at its saved scroll position
    /// without any request; an empty track asks the caller to load it.
    ///
    /// # Arguments
    ///
    /// * `mode` - Track to show
    /// * `label` - Title passed to the view
    ///
    /// # Returns
    ///
    /// [`ModeSwitch::Load`] with a fresh token when the track is empty,
    /// [`ModeSwitch::Restored`] when it was redrawn from memory, and
    /// [`ModeSwitch::AlreadyActive`] when nothing changed.
    pub fn set_mode(&self, mode: FeedMode, label: &str) -> ModeSwitch {
        let view = &self.shared.view;
        let (outcome, to_register) = {
            let mut state = self.shared.state.lock();
            if state.active == mode && !state.tracks.get(mode).items.is_empty() {
                return ModeSwitch::AlreadyActive;
            }

            let epoch = state.epoch.advance();
            state.loading = None;

            let outgoing = state.active;
            state.tracks.get_mut(outgoing).scroll_offset = view.scroll_offset();
            state.active = mode;

            view.clear();
            view.set_title(label);
            tracing::debug!(from = %outgoing, to = %mode, epoch, "Switching mode");

            let track = state.tracks.get_mut(mode);
            if track.items.is_empty() {
                view.set_status(FeedStatus::Idle);
                (ModeSwitch::Load(LoadToken::new(epoch, mode)), Vec::new())
            } else {
                for item in track.items.iter_mut().filter(|i| i.needs_resolution()) {
                    if let Some(info) = self.poller.get_cached(item.id) {
                        item.settle_category(Some(&self.shared.translated_info(&info)));
                    }
                }
                let pending: Vec<ItemId> = track
                    .items
                    .iter()
                    .filter(|i| i.needs_resolution())
                    .map(|i| i.id)
                    .collect();

                view.append(&track.items);
                view.set_status(if track.exhausted {
                    FeedStatus::Exhausted
                } else {
                    FeedStatus::Idle
                });
                view.restore_scroll(track.scroll_offset);
                (ModeSwitch::Restored, pending)
            }
        };

        // Outside the lock: the poller may answer synchronously through the relay.
        self.poller.add_all(to_register);
        outcome
    }

    /// `set_mode` followed by the initial batch when the track is empty.
    pub async fn switch_mode(&self, mode: FeedMode, label: &str) -> ModeSwitch {
        let outcome = self.set_mode(mode, label);
        if let ModeSwitch::Load(token) = outcome {
            self.load_pages(true, token).await;
        }
        outcome
    }

    /// Throws away every track and reloads the active one from page 1.
    pub fn refresh(&self) -> ModeSwitch {
        let active = {
            let mut state = self.shared.state.lock();
            let epoch = state.epoch.advance();
            state.loading = None;
            state.tracks.reset_all();
            tracing::info!(mode = %state.active, epoch, "Refreshing all tracks");
            state.active
        };
        self.set_mode(active, active.title())
    }

    /// Replaces the request filters and refreshes.
    pub fn set_filters(&self, filters: FeedFilters) -> ModeSwitch {
        self.shared.state.lock().filters = filters;
        self.refresh()
    }

    /// Viewport reached the end of the list. Returns a token for
    /// `load_pages(false, token)` unless the track is finished or a load is
    /// already running.
    pub fn on_near_bottom(&self) -> Option<LoadToken> {
        let state = self.shared.state.lock();
        if state.loading.is_some() || state.tracks.get(state.active).exhausted {
            return None;
        }
        Some(state.epoch.token(state.active))
    }

    /// Loads up to [`PAGES_PER_BATCH`] pages in order.
    ///
    /// # Arguments
    ///
    /// * `is_initial` - Use the larger placeholder count for the first page
    /// * `token` - Token from `set_mode`, `refresh` or `on_near_bottom`
    ///
    /// # Returns
    ///
    /// The last page's outcome. The batch stops early on anything other than
    /// [`PageOutcome::Appended`], and returns [`PageOutcome::Stale`] as soon
    /// as the token is superseded.
    pub async fn load_pages(&self, is_initial: bool, token: LoadToken) -> PageOutcome {
        let mut last = PageOutcome::Skipped;
        for index in 0..PAGES_PER_BATCH {
            if !self.still_valid(&token) {
                tracing::debug!(epoch = token.epoch(), mode = %token.mode(), "Abandoning stale batch");
                return PageOutcome::Stale;
            }
            last = self.load_one_page(token, is_initial && index == 0).await;
            if !matches!(last, PageOutcome::Appended(_)) {
                break;
            }
        }
        last
    }

    /// Fetches the next page of the token's track.
    ///
    /// The token is re-checked after the response arrives and again after
    /// the body is parsed; a superseded load returns [`PageOutcome::Stale`]
    /// without touching the track or the view.
    ///
    /// # Returns
    ///
    /// * `Appended(n)` - Page accepted and the cursor advanced
    /// * `Exhausted` - Upstream sent no records, or the track had already ended
    /// * `Failed` - Request or parse failed; the status shows the error
    /// * `Skipped` - Another load holds the loading flag
    /// * `Stale` - A mode switch or refresh happened meanwhile
    pub async fn load_one_page(&self, token: LoadToken, is_initial: bool) -> PageOutcome {
        let view = &self.shared.view;
        let request = {
            let mut state = self.shared.state.lock();
            if !state.still_valid(&token) {
                return PageOutcome::Stale;
            }
            if state.loading.is_some() {
                return PageOutcome::Skipped;
            }
            let track = state.tracks.get(token.mode());
            if track.exhausted {
                return PageOutcome::Exhausted;
            }
            let request = PageRequest {
                mode: token.mode(),
                page: track.page,
                filters: state.filters.clone(),
            };
            state.loading = Some(token.epoch());

            view.set_status(FeedStatus::Loading);
            view.show_placeholders(if is_initial {
                INITIAL_PLACEHOLDERS
            } else {
                MORE_PLACEHOLDERS
            });
            request
        };

        let body = match self.source.open_page(&request).await {
            Ok(body) => body,
            Err(e) => return self.fail(&token, &request, e),
        };
        if !self.still_valid(&token) {
            tracing::debug!(mode = %request.mode, page = request.page, "Dropping stale response");
            return PageOutcome::Stale;
        }

        let page = match body.into_page().await {
            Ok(page) => page,
            Err(e) => return self.fail(&token, &request, e),
        };

        let (outcome, to_register) = {
            let mut state = self.shared.state.lock();
            if !state.still_valid(&token) {
                tracing::debug!(mode = %request.mode, page = request.page, "Dropping stale page");
                return PageOutcome::Stale;
            }
            state.loading = None;
            view.clear_placeholders();

            let track = state.tracks.get_mut(token.mode());
            if page.is_end() {
                track.exhausted = true;
                view.set_status(FeedStatus::Exhausted);
                tracing::info!(mode = %request.mode, page = request.page, "Feed exhausted");
                (PageOutcome::Exhausted, Vec::new())
            } else {
                let items: Vec<ResolvedItem> =
                    page.items.into_iter().map(|item| self.prepare(item)).collect();
                let pending: Vec<ItemId> = items
                    .iter()
                    .filter(|i| i.needs_resolution())
                    .map(|i| i.id)
                    .collect();
                let count = items.len();

                // Records may all have been dropped; the cursor still moves on.
                if !items.is_empty() {
                    view.append(&items);
                    track.items.extend(items);
                }
                track.page += 1;
                view.set_status(FeedStatus::Idle);
                tracing::debug!(
                    mode = %request.mode,
                    page = request.page,
                    raw = page.raw,
                    count,
                    pending = pending.len(),
                    "Page appended"
                );
                (PageOutcome::Appended(count), pending)
            }
        };

        self.poller.add_all(to_register);
        outcome
    }

    fn fail(&self, token: &LoadToken, request: &PageRequest, error: ApiError) -> PageOutcome {
        let mut state = self.shared.state.lock();
        if !state.still_valid(token) {
            tracing::debug!(mode = %request.mode, error = %error, "Ignoring failure of stale load");
            return PageOutcome::Stale;
        }
        state.loading = None;
        tracing::warn!(mode = %request.mode, page = request.page, error = %error, "Page load failed");
        self.shared.view.clear_placeholders();
        self.shared.view.set_status(FeedStatus::Failed(error.to_string()));
        PageOutcome::Failed
    }

    /// Applies the translation overlay and any cached category to a freshly
    /// fetched item.
    fn prepare(&self, mut item: ResolvedItem) -> ResolvedItem {
        item.name = self.shared.overlay.translate(&item.name).into_owned();
        match &item.category {
            Category::Resolved { label, id } => {
                item.category = Category::Resolved {
                    label: self.shared.overlay.translate_category(label).into_owned(),
                    id: *id,
                };
            }
            Category::Pending => {
                if let Some(info) = self.poller.get_cached(item.id) {
                    item.settle_category(Some(&self.shared.translated_info(&info)));
                }
            }
            Category::Unknown => {}
        }
        item
    }
}
