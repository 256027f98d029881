//! Scripted doubles for driving the controller without a network.
#![allow(dead_code)]

use async_trait::async_trait;
use bananaview::api::ApiError;
use bananaview::feed::{
    Author, Category, FeedController, FeedFilters, FeedMode, FeedPage, FeedSource, FeedStatus,
    FeedView, ItemId, ItemKind, ItemStats, PageBody, PageRequest, ResolvedItem,
};
use bananaview::resolution::{
    BackoffPoller, CategoryInfo, LookupStatus, MetadataSource, PollerConfig, ResolutionCache,
};
use bananaview::translation::{TermEntry, TranslationOverlay};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub fn item(id: u64, kind: ItemKind, name: &str) -> ResolvedItem {
    let category = if kind.needs_lookup() {
        Category::Pending
    } else {
        Category::Resolved {
            label: kind.name().to_string(),
            id: None,
        }
    };
    ResolvedItem {
        id: ItemId(id),
        kind,
        name: name.to_string(),
        author: Author {
            name: "tester".into(),
            profile_url: None,
        },
        page_url: Some(format!("https://gamebanana.com/mods/{}", id)),
        thumbnail_url: None,
        snippet: None,
        category,
        stats: ItemStats::default(),
        added_at: None,
        has_advisory: false,
    }
}

/// `count` tool items with ids starting at `first`. Tools need no lookup.
pub fn tools(first: u64, count: u64) -> Vec<ResolvedItem> {
    (first..first + count)
        .map(|id| item(id, ItemKind::Tool, &format!("Tool {}", id)))
        .collect()
}

#[derive(Clone)]
pub enum Script {
    Items(Vec<ResolvedItem>),
    /// Page with `raw` records upstream, none of them usable.
    Unusable(usize),
    Fail,
    /// Response held until the notify fires.
    Gated(Arc<Notify>, Vec<ResolvedItem>),
    /// Response arrives at once; reading the body waits for the notify.
    SlowBody(Arc<Notify>, Vec<ResolvedItem>),
}

/// Serves scripted pages. Unscripted pages are empty.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<(FeedMode, u32), Script>>,
    requests: Mutex<Vec<PageRequest>>,
    parsing: Arc<Notify>,
}

impl ScriptedSource {
    pub fn script(&self, mode: FeedMode, page: u32, script: Script) {
        self.scripts.lock().insert((mode, page), script);
    }

    /// Gates a page and returns the notify that releases it.
    pub fn gate(&self, mode: FeedMode, page: u32, items: Vec<ResolvedItem>) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script(mode, page, Script::Gated(Arc::clone(&notify), items));
        notify
    }

    /// Lets the response through but holds the body until the notify fires.
    pub fn gate_body(&self, mode: FeedMode, page: u32, items: Vec<ResolvedItem>) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script(mode, page, Script::SlowBody(Arc::clone(&notify), items));
        notify
    }

    pub fn requests(&self) -> Vec<(FeedMode, u32)> {
        self.requests.lock().iter().map(|r| (r.mode, r.page)).collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Waits until a slow body has started parsing.
    pub async fn wait_for_parse(&self) {
        self.parsing.notified().await;
    }

    /// Yields until `n` requests have been made.
    pub async fn wait_for_requests(&self, n: usize) {
        for _ in 0..1000 {
            if self.request_count() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} requests, saw {:?}", n, self.requests());
    }
}

struct ReadyBody(FeedPage);

#[async_trait]
impl PageBody for ReadyBody {
    async fn into_page(self: Box<Self>) -> Result<FeedPage, ApiError> {
        Ok(self.0)
    }
}

/// Body whose parse blocks until released. `parsing` fires once it starts.
struct SlowBody {
    release: Arc<Notify>,
    parsing: Arc<Notify>,
    items: Vec<ResolvedItem>,
}

#[async_trait]
impl PageBody for SlowBody {
    async fn into_page(self: Box<Self>) -> Result<FeedPage, ApiError> {
        self.parsing.notify_one();
        self.release.notified().await;
        Ok(FeedPage::new(self.items))
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn open_page(&self, request: &PageRequest) -> Result<Box<dyn PageBody>, ApiError> {
        self.requests.lock().push(request.clone());
        let script = self.scripts.lock().get(&(request.mode, request.page)).cloned();
        match script {
            None => Ok(Box::new(ReadyBody(FeedPage::default()))),
            Some(Script::Items(items)) => Ok(Box::new(ReadyBody(FeedPage::new(items)))),
            Some(Script::Unusable(raw)) => Ok(Box::new(ReadyBody(FeedPage {
                raw,
                items: Vec::new(),
            }))),
            Some(Script::Fail) => Err(ApiError::HttpStatus(503)),
            Some(Script::Gated(notify, items)) => {
                notify.notified().await;
                Ok(Box::new(ReadyBody(FeedPage::new(items))))
            }
            Some(Script::SlowBody(release, items)) => Ok(Box::new(SlowBody {
                release,
                parsing: Arc::clone(&self.parsing),
                items,
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Clear,
    Title(String),
    Placeholders(usize),
    ClearPlaceholders,
    Append(Vec<ItemId>),
    Status(FeedStatus),
    RestoreScroll(usize),
    Update(ItemId, Option<String>),
}

/// Records every view call in order.
#[derive(Default)]
pub struct RecordingView {
    calls: Mutex<Vec<ViewCall>>,
    scroll: AtomicUsize,
}

impl RecordingView {
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<ViewCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn scroll_to(&self, offset: usize) {
        self.scroll.store(offset, Ordering::Relaxed);
    }

    /// Ids appended since the last clear, in order.
    pub fn visible_ids(&self) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for call in self.calls.lock().iter() {
            match call {
                ViewCall::Clear => ids.clear(),
                ViewCall::Append(batch) => ids.extend(batch.iter().copied()),
                _ => {}
            }
        }
        ids
    }

    fn push(&self, call: ViewCall) {
        self.calls.lock().push(call);
    }
}

impl FeedView for RecordingView {
    fn clear(&self) {
        self.push(ViewCall::Clear);
    }

    fn set_title(&self, title: &str) {
        self.push(ViewCall::Title(title.to_string()));
    }

    fn show_placeholders(&self, count: usize) {
        self.push(ViewCall::Placeholders(count));
    }

    fn clear_placeholders(&self) {
        self.push(ViewCall::ClearPlaceholders);
    }

    fn append(&self, items: &[ResolvedItem]) {
        self.push(ViewCall::Append(items.iter().map(|i| i.id).collect()));
    }

    fn set_status(&self, status: FeedStatus) {
        self.push(ViewCall::Status(status));
    }

    fn scroll_offset(&self) -> usize {
        self.scroll.load(Ordering::Relaxed)
    }

    fn restore_scroll(&self, offset: usize) {
        self.scroll.store(offset, Ordering::Relaxed);
        self.push(ViewCall::RestoreScroll(offset));
    }

    fn update_item(&self, id: ItemId, info: Option<&CategoryInfo>) {
        self.push(ViewCall::Update(id, info.map(|i| i.name.clone())));
    }
}

/// Metadata service answering from a fixed table; other ids stay pending.
#[derive(Default)]
pub struct TableMetadata {
    answers: Mutex<HashMap<ItemId, LookupStatus>>,
    pub calls: AtomicUsize,
}

impl TableMetadata {
    pub fn resolve(&self, id: u64, name: &str, category_id: u64) {
        self.answers.lock().insert(
            ItemId(id),
            LookupStatus::Resolved(CategoryInfo::new(name, Some(category_id))),
        );
    }
}

#[async_trait]
impl MetadataSource for TableMetadata {
    async fn lookup(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, LookupStatus>, ApiError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let answers = self.answers.lock();
        Ok(ids
            .iter()
            .filter_map(|id| answers.get(id).map(|s| (*id, s.clone())))
            .collect())
    }
}

/// Everything a controller test needs, wired together.
pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub view: Arc<RecordingView>,
    pub metadata: Arc<TableMetadata>,
    pub cache: Arc<ResolutionCache>,
    pub controller: FeedController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_terms(Vec::new())
    }

    pub fn with_terms(terms: Vec<TermEntry>) -> Self {
        let source = Arc::new(ScriptedSource::default());
        let view = Arc::new(RecordingView::default());
        let metadata = Arc::new(TableMetadata::default());
        let cache = Arc::new(ResolutionCache::new());
        let overlay = Arc::new(TranslationOverlay::new());
        if !terms.is_empty() {
            overlay.load(terms);
        }
        // Long base interval: tests drive polls with poll_once().
        let poller = BackoffPoller::new(
            metadata.clone(),
            Arc::clone(&cache),
            PollerConfig {
                base_interval: Duration::from_secs(3600),
                ..PollerConfig::default()
            },
        );
        let controller = FeedController::new(
            source.clone(),
            poller,
            view.clone(),
            overlay,
            FeedFilters::default(),
        );
        Self {
            source,
            view,
            metadata,
            cache,
            controller,
        }
    }
}
