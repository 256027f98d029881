use crate::api::{ApiClient, HealthStatus, ItemProfile};
use crate::feed::{
    AdvisoryMode, FeedController, FeedMode, FeedStatus, FeedView, ItemId, ResolvedItem,
};
use crate::resolution::CategoryInfo;
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long a status message stays in the footer.
const STATUS_TTL_SECS: u64 = 3;

/// Events delivered to the UI loop.
///
/// The first group mirrors [`FeedView`] calls made by the controller; the
/// rest come from spawned background tasks.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Cleared,
    TitleChanged(String),
    PlaceholdersShown(usize),
    PlaceholdersCleared,
    ItemsAppended(Vec<ResolvedItem>),
    StatusChanged(FeedStatus),
    ScrollRestored(usize),
    /// A pending category settled. `info` is already translated.
    ItemResolved {
        id: ItemId,
        info: Option<CategoryInfo>,
    },
    HealthChecked(HealthStatus),
    /// Profile fetch for the detail overlay finished. The name is already
    /// translated.
    ProfileLoaded {
        id: ItemId,
        result: Result<Box<ItemProfile>, String>,
    },
    /// A background task panicked.
    ///
    /// Fields:
    /// - `task`: Name of the task that panicked (e.g., "feed_load")
    /// - `error`: The panic message extracted from the panic payload
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

/// [`FeedView`] that forwards every call to the UI loop.
///
/// Sends never block, so it is safe to call from inside the controller's
/// critical sections. The scroll position is shared with [`FeedPane`] so
/// `scroll_offset` can answer synchronously.
pub struct ChannelView {
    tx: mpsc::UnboundedSender<AppEvent>,
    scroll: Arc<AtomicUsize>,
}

impl ChannelView {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>, scroll: Arc<AtomicUsize>) -> Self {
        Self { tx, scroll }
    }

    fn send(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("UI loop gone, dropping view event");
        }
    }
}

impl FeedView for ChannelView {
    fn clear(&self) {
        self.scroll.store(0, Ordering::Relaxed);
        self.send(AppEvent::Cleared);
    }

    fn set_title(&self, title: &str) {
        self.send(AppEvent::TitleChanged(title.to_string()));
    }

    fn show_placeholders(&self, count: usize) {
        self.send(AppEvent::PlaceholdersShown(count));
    }

    fn clear_placeholders(&self) {
        self.send(AppEvent::PlaceholdersCleared);
    }

    fn append(&self, items: &[ResolvedItem]) {
        self.send(AppEvent::ItemsAppended(items.to_vec()));
    }

    fn set_status(&self, status: FeedStatus) {
        self.send(AppEvent::StatusChanged(status));
    }

    fn scroll_offset(&self) -> usize {
        self.scroll.load(Ordering::Relaxed)
    }

    fn restore_scroll(&self, offset: usize) {
        self.scroll.store(offset, Ordering::Relaxed);
        self.send(AppEvent::ScrollRestored(offset));
    }

    fn update_item(&self, id: ItemId, info: Option<&CategoryInfo>) {
        self.send(AppEvent::ItemResolved {
            id,
            info: info.cloned(),
        });
    }
}

/// The visible card list, rebuilt from view events.
#[derive(Debug, Default)]
pub struct FeedPane {
    pub cards: Vec<ResolvedItem>,
    pub placeholders: usize,
    pub title: String,
    pub status: FeedStatus,
    pub advisory: AdvisoryMode,
    /// Index into the visible cards.
    selected: usize,
    scroll: Arc<AtomicUsize>,
}

impl FeedPane {
    pub fn new(scroll: Arc<AtomicUsize>, advisory: AdvisoryMode) -> Self {
        Self {
            advisory,
            scroll,
            ..Self::default()
        }
    }

    pub fn scroll_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.scroll)
    }

    /// Applies a view event. Returns false for events that are not about
    /// the card list.
    pub fn apply(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Cleared => {
                self.cards.clear();
                self.placeholders = 0;
                self.status = FeedStatus::Idle;
                self.set_selected(0);
            }
            AppEvent::TitleChanged(title) => self.title = title,
            AppEvent::PlaceholdersShown(count) => self.placeholders = count,
            AppEvent::PlaceholdersCleared => self.placeholders = 0,
            AppEvent::ItemsAppended(items) => self.cards.extend(items),
            AppEvent::StatusChanged(status) => self.status = status,
            AppEvent::ScrollRestored(offset) => self.set_selected(offset),
            AppEvent::ItemResolved { id, info } => {
                if let Some(card) = self.cards.iter_mut().find(|c| c.id == id) {
                    card.settle_category(info.as_ref());
                }
            }
            AppEvent::HealthChecked(_)
            | AppEvent::ProfileLoaded { .. }
            | AppEvent::TaskPanicked { .. } => return false,
        }
        true
    }

    pub fn visible_cards(&self) -> impl Iterator<Item = &ResolvedItem> {
        let advisory = self.advisory;
        self.cards
            .iter()
            .filter(move |c| advisory.is_visible(c.has_advisory))
    }

    pub fn visible_len(&self) -> usize {
        self.visible_cards().count()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_card(&self) -> Option<&ResolvedItem> {
        self.visible_cards().nth(self.selected)
    }

    fn set_selected(&mut self, index: usize) {
        self.selected = index;
        self.scroll.store(index, Ordering::Relaxed);
    }

    /// Moves the selection by `delta`, clamped to the visible list.
    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible_len();
        if len == 0 {
            self.set_selected(0);
            return;
        }
        let target = self.selected.saturating_add_signed(delta).min(len - 1);
        self.set_selected(target);
    }

    pub fn select_first(&mut self) {
        self.set_selected(0);
    }

    pub fn select_last(&mut self) {
        let len = self.visible_len();
        self.set_selected(len.saturating_sub(1));
    }

    /// Restored offsets can point past the list until its items arrive.
    pub fn clamp_selection(&mut self) {
        let len = self.visible_len();
        if self.selected >= len {
            self.set_selected(len.saturating_sub(1));
        }
    }

    pub fn cycle_advisory(&mut self) -> AdvisoryMode {
        self.advisory = self.advisory.next();
        self.clamp_selection();
        self.advisory
    }

    /// Whether the selection is within `rows` of the end of the list.
    pub fn near_bottom(&self, rows: usize) -> bool {
        self.visible_len().saturating_sub(self.selected) <= rows
    }
}

/// Content state of the detail overlay.
#[derive(Debug, Clone)]
pub enum DetailState {
    Loading,
    Loaded(Box<ItemProfile>),
    Failed(String),
}

/// The detail overlay for one item.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub id: ItemId,
    /// Card name, shown until the profile arrives.
    pub title: String,
    pub page_url: Option<String>,
    pub state: DetailState,
    pub scroll: usize,
    /// Set on each draw from the rendered line count.
    pub max_scroll: usize,
}

impl DetailView {
    pub fn loading(card: &ResolvedItem) -> Self {
        Self {
            id: card.id,
            title: card.name.clone(),
            page_url: card.page_url.clone(),
            state: DetailState::Loading,
            scroll: 0,
            max_scroll: 0,
        }
    }

    /// Installs a fetch result. Results for another item (the overlay was
    /// closed and reopened meanwhile) are ignored and false is returned.
    pub fn accept(&mut self, id: ItemId, result: Result<Box<ItemProfile>, String>) -> bool {
        if id != self.id {
            return false;
        }
        self.state = match result {
            Ok(profile) => {
                if self.page_url.is_none() {
                    self.page_url = profile.page_url.clone();
                }
                DetailState::Loaded(profile)
            }
            Err(error) => DetailState::Failed(error),
        };
        self.scroll = 0;
        true
    }

    pub fn profile(&self) -> Option<&ItemProfile> {
        match &self.state {
            DetailState::Loaded(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll = self.scroll.saturating_add_signed(delta).min(self.max_scroll);
    }

    pub fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll);
    }
}

/// Application state
pub struct App {
    pub controller: FeedController,
    pub api: Arc<ApiClient>,
    pub pane: FeedPane,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    /// Only redraw when something changed.
    pub needs_redraw: bool,
    pub health: Option<HealthStatus>,
    pub show_help: bool,
    /// Open detail overlay, if any. Captures keys while shown.
    pub detail: Option<DetailView>,
    pub spinner_frame: usize,
    /// Rows the card list had on the last draw.
    pub list_rows: usize,
    /// Batch task currently feeding the active track.
    pub load_task: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(controller: FeedController, api: Arc<ApiClient>, pane: FeedPane) -> Self {
        Self {
            controller,
            api,
            pane,
            status_message: None,
            needs_redraw: true,
            health: None,
            show_help: false,
            detail: None,
            spinner_frame: 0,
            list_rows: 0,
            load_task: None,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.controller.active_mode()
    }

    pub fn load_running(&self) -> bool {
        self.load_task.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}
