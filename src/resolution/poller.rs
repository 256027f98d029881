use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::cache::{CategoryInfo, ResolutionCache};
use crate::api::ApiError;
use crate::feed::ItemId;

/// What the metadata service said about one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStatus {
    Resolved(CategoryInfo),
    /// The service gave up on this id; it will never resolve.
    Failed,
    /// Still being worked on; ask again later.
    Pending,
}

/// Batched category lookup. Ids left out of the reply count as pending.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn lookup(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, LookupStatus>, ApiError>;
}

/// Receives each id's final outcome exactly once per registration.
/// `None` means the id will stay unresolved.
pub trait ResolutionSink: Send + Sync {
    fn update_item(&self, id: ItemId, info: Option<&CategoryInfo>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: u32,
    /// Lookups an id may sit through before it is given up on; 0 = no cap.
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(5_000),
            max_interval: Duration::from_millis(30_000),
            backoff_factor: 2,
            max_attempts: 20,
        }
    }
}

/// Summary of one poll, mostly for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub requested: usize,
    pub resolved: Vec<ItemId>,
    pub failed: Vec<ItemId>,
    pub still_pending: usize,
    pub request_failed: bool,
    /// Another poll was already running; nothing was done.
    pub busy: bool,
    /// Delay until the next poll, if one was scheduled.
    pub next_poll: Option<Duration>,
}

#[derive(Default)]
struct PollerState {
    pending: BTreeSet<ItemId>,
    attempts: HashMap<ItemId, u32>,
    failed: HashSet<ItemId>,
    consecutive_errors: u32,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the timer is replaced so a superseded timer task
    /// that already woke up does nothing.
    timer_seq: u64,
    in_flight: bool,
}

/// Holds `in_flight` for one poll. Dropping it unfinished (the poll future
/// was cancelled mid-lookup) clears the flag without rescheduling.
struct InFlight<'a> {
    state: &'a Mutex<PollerState>,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, state: &mut PollerState) {
        state.in_flight = false;
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.lock().in_flight = false;
            tracing::debug!("Category poll dropped before the lookup finished");
        }
    }
}

struct Inner {
    source: Arc<dyn MetadataSource>,
    cache: Arc<ResolutionCache>,
    sink: RwLock<Option<Arc<dyn ResolutionSink>>>,
    config: PollerConfig,
    state: Mutex<PollerState>,
}

/// Batches pending category lookups and retries them with exponential
/// backoff.
///
/// Per id: `unseen → pending → resolved | failed`, or straight from unseen to
/// resolved on a cache hit. Both end states last for the life of the
/// process. The state lock is never held across an await and the sink is
/// always called with it released.
#[derive(Clone)]
pub struct BackoffPoller {
    inner: Arc<Inner>,
}

impl BackoffPoller {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        cache: Arc<ResolutionCache>,
        config: PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache,
                sink: RwLock::new(None),
                config,
                state: Mutex::new(PollerState::default()),
            }),
        }
    }

    /// Sets where outcomes are delivered. Outcomes produced while no sink is
    /// set are still cached but not reported.
    pub fn set_sink(&self, sink: Arc<dyn ResolutionSink>) {
        *self.inner.sink.write() = Some(sink);
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.inner.cache
    }

    /// Registers an id for resolution.
    ///
    /// A cached id is delivered immediately and a given-up id is reported as
    /// `None` immediately; neither touches the pending set or the timer.
    /// Otherwise the id joins the pending set (once) and a poll is scheduled
    /// unless one is already armed or running.
    ///
    /// # Arguments
    ///
    /// * `id` - Item whose category is wanted
    pub fn add(&self, id: ItemId) {
        let immediate = {
            let mut state = self.inner.state.lock();
            if let Some(info) = self.inner.cache.get(id) {
                Some(Some(info))
            } else if state.failed.contains(&id) {
                Some(None)
            } else {
                if state.pending.insert(id) {
                    tracing::trace!(id = %id, "Queued for category lookup");
                }
                if state.timer.is_none() && !state.in_flight {
                    self.schedule(&mut state, self.inner.config.base_interval);
                }
                None
            }
        };

        if let Some(outcome) = immediate {
            self.deliver(id, outcome.as_ref());
        }
    }

    pub fn add_all<I: IntoIterator<Item = ItemId>>(&self, ids: I) {
        for id in ids {
            self.add(id);
        }
    }

    /// Runs one batched lookup over everything pending.
    ///
    /// Resolved ids go into the cache, given-up ids become terminal, and the
    /// rest stay queued with the next poll scheduled at the backoff interval.
    /// Outcomes reach the sink after the state lock is released.
    ///
    /// # Returns
    ///
    /// A [`PollReport`]; `busy` is set when another poll was already
    /// running and nothing was done.
    ///
    /// # Cancellation
    ///
    /// Dropping the future mid-lookup releases the in-flight flag, so later
    /// calls and `add` behave as if the poll never started. Nothing is
    /// rescheduled in that case.
    pub async fn poll_once(&self) -> PollReport {
        let (ids, guard): (Vec<ItemId>, InFlight<'_>) = {
            let mut state = self.inner.state.lock();
            if state.in_flight {
                return PollReport {
                    busy: true,
                    ..PollReport::default()
                };
            }
            if state.pending.is_empty() {
                Self::cancel_timer(&mut state);
                return PollReport::default();
            }
            state.in_flight = true;
            (
                state.pending.iter().copied().collect(),
                InFlight {
                    state: &self.inner.state,
                    finished: false,
                },
            )
        };

        tracing::debug!(count = ids.len(), "Polling category lookups");
        let result = self.inner.source.lookup(&ids).await;

        let mut report = PollReport {
            requested: ids.len(),
            ..PollReport::default()
        };
        let mut outcomes: Vec<(ItemId, Option<CategoryInfo>)> = Vec::new();
        {
            let mut state = self.inner.state.lock();
            guard.finish(&mut state);

            match result {
                Ok(mut replies) => {
                    state.consecutive_errors = 0;
                    for id in &ids {
                        match replies.remove(id) {
                            Some(LookupStatus::Resolved(info)) => {
                                self.inner.cache.insert(*id, info.clone());
                                let info = self.inner.cache.get(*id).unwrap_or(info);
                                state.pending.remove(id);
                                state.attempts.remove(id);
                                report.resolved.push(*id);
                                outcomes.push((*id, Some(info)));
                            }
                            Some(LookupStatus::Failed) => {
                                state.pending.remove(id);
                                state.attempts.remove(id);
                                state.failed.insert(*id);
                                report.failed.push(*id);
                                outcomes.push((*id, None));
                            }
                            Some(LookupStatus::Pending) | None => {
                                *state.attempts.entry(*id).or_insert(0) += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                    report.request_failed = true;
                    tracing::warn!(
                        error = %e,
                        consecutive_errors = state.consecutive_errors,
                        "Category lookup failed, backing off"
                    );
                    for id in &ids {
                        *state.attempts.entry(*id).or_insert(0) += 1;
                    }
                }
            }

            let max_attempts = self.inner.config.max_attempts;
            if max_attempts > 0 {
                let exhausted: Vec<ItemId> = ids
                    .iter()
                    .copied()
                    .filter(|id| state.attempts.get(id).is_some_and(|n| *n >= max_attempts))
                    .collect();
                for id in exhausted {
                    state.pending.remove(&id);
                    state.attempts.remove(&id);
                    state.failed.insert(id);
                    tracing::debug!(id = %id, attempts = max_attempts, "Giving up on category lookup");
                    report.failed.push(id);
                    outcomes.push((id, None));
                }
            }

            report.still_pending = state.pending.len();
            if state.pending.is_empty() {
                Self::cancel_timer(&mut state);
            } else {
                let interval = self.compute_interval(state.consecutive_errors);
                self.schedule(&mut state, interval);
                report.next_poll = Some(interval);
            }
        }

        for (id, info) in &outcomes {
            self.deliver(*id, info.as_ref());
        }
        report
    }

    /// `min(base × factor^errors, max)`.
    pub fn compute_interval(&self, errors: u32) -> Duration {
        let config = &self.inner.config;
        let factor = config.backoff_factor.max(1) as u128;
        let cap = config.max_interval.max(config.base_interval).as_millis();
        let millis = factor
            .checked_pow(errors)
            .and_then(|m| config.base_interval.as_millis().checked_mul(m))
            .map_or(cap, |ms| ms.min(cap));
        Duration::from_millis(millis as u64)
    }

    pub fn next_interval(&self) -> Duration {
        self.compute_interval(self.consecutive_errors())
    }

    pub fn get_cached(&self, id: ItemId) -> Option<CategoryInfo> {
        self.inner.cache.get(id)
    }

    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.inner.state.lock().pending.iter().copied().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn is_pending(&self, id: ItemId) -> bool {
        self.inner.state.lock().pending.contains(&id)
    }

    pub fn is_failed(&self, id: ItemId) -> bool {
        self.inner.state.lock().failed.contains(&id)
    }

    pub fn has_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.inner.state.lock().consecutive_errors
    }

    /// Stops the timer. Pending ids stay queued and a later `add` re-arms it.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        Self::cancel_timer(&mut state);
    }

    fn deliver(&self, id: ItemId, info: Option<&CategoryInfo>) {
        let sink = self.inner.sink.read().clone();
        if let Some(sink) = sink {
            sink.update_item(id, info);
        }
    }

    fn cancel_timer(state: &mut PollerState) {
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        state.timer_seq = state.timer_seq.wrapping_add(1);
    }

    fn schedule(&self, state: &mut PollerState, delay: Duration) {
        Self::cancel_timer(state);
        let seq = state.timer_seq;
        let poller = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            poller.fire_timer(seq).await;
        }));
    }

    async fn fire_timer(&self, seq: u64) {
        {
            let mut state = self.inner.state.lock();
            if state.timer_seq != seq {
                return;
            }
            // Detach our own handle so rescheduling from inside the poll
            // does not abort this task.
            state.timer = None;
        }
        let report = self.poll_once().await;
        tracing::trace!(?report, "Scheduled category poll finished");
    }
}
