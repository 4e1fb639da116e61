//! Live directory state: atomic snapshot swaps, coalesced refetches,
//! status polling and debounced search input.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::display::DisplayOptions;
use crate::index::reviewers::{
    FilterState, ReviewerEngine, ReviewerSearchResponse, SortColumn, SortState,
};
use crate::record::{RawReviewer, Reviewer};
use crate::status::{ServiceStatus, poll_status};
use crate::store::{AvailabilityPolicy, ReviewerSource, StoreError, listable_reviewers};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(200);
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// One published collection. Replaced wholesale, never patched.
#[derive(Debug, Default)]
pub struct DirectorySnapshot {
    pub generation: u64,
    pub engine: ReviewerEngine,
    pub last_updated: Option<SystemTime>,
}

impl DirectorySnapshot {
    pub fn new(generation: u64, reviewers: Vec<Reviewer>, fetched_at: SystemTime) -> Self {
        Self {
            generation,
            engine: ReviewerEngine::new(reviewers),
            last_updated: Some(fetched_at),
        }
    }

    pub fn last_updated_secs(&self) -> Option<u64> {
        self.last_updated
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }
}

#[derive(Debug, Clone, Default)]
struct FetchState {
    in_flight: usize,
    last_error: Option<String>,
    // generation of the newest fetch that finished, successfully or not
    settled_generation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStats {
    pub total: usize,
    pub generation: u64,
    pub last_updated: Option<u64>,
    pub loading: bool,
    pub error: Option<String>,
    pub status: Option<ServiceStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct LiveOptions {
    /// Refetch on this period as well as on change signals.
    pub refresh_every: Option<Duration>,
    pub status_url: Option<String>,
}

struct Inner {
    source: Arc<dyn ReviewerSource>,
    policy: AvailabilityPolicy,
    snapshot: watch::Sender<Arc<DirectorySnapshot>>,
    fetch: watch::Sender<FetchState>,
    status: watch::Sender<Option<ServiceStatus>>,
    next_generation: AtomicU64,
    changed: Notify,
}

impl Inner {
    async fn refresh(&self) -> bool {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.fetch.send_modify(|f| f.in_flight += 1);
        let result = self.source.fetch().await;
        self.apply(generation, result)
    }

    /// Publish a finished fetch unless a later one already landed.
    fn apply(&self, generation: u64, result: Result<Vec<RawReviewer>, StoreError>) -> bool {
        let (applied, error) = match result {
            Ok(rows) => {
                let reviewers = listable_reviewers(rows, self.policy);
                let count = reviewers.len();
                let applied = self.snapshot.send_if_modified(|current| {
                    if generation <= current.generation {
                        return false;
                    }
                    *current = Arc::new(DirectorySnapshot::new(
                        generation,
                        reviewers,
                        SystemTime::now(),
                    ));
                    true
                });
                if applied {
                    tracing::info!("Loaded {} reviewers (generation {})", count, generation);
                } else {
                    tracing::debug!("Discarding stale fetch (generation {})", generation);
                }
                (applied, None)
            }
            Err(e) => {
                // the previous snapshot stays published
                tracing::warn!("Reviewer fetch failed: {}", e);
                (false, Some(e.to_string()))
            }
        };
        self.fetch.send_modify(|f| {
            f.in_flight = f.in_flight.saturating_sub(1);
            if generation > f.settled_generation {
                f.settled_generation = generation;
                f.last_error = error;
            }
        });
        applied
    }
}

/// Serves the latest snapshot while refetches run in the background.
pub struct LiveDirectory {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LiveDirectory {
    pub fn new(source: Arc<dyn ReviewerSource>, policy: AvailabilityPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                policy,
                snapshot: watch::Sender::new(Arc::new(DirectorySnapshot::default())),
                fetch: watch::Sender::new(FetchState::default()),
                status: watch::Sender::new(None),
                next_generation: AtomicU64::new(0),
                changed: Notify::new(),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the refresh worker (which fetches immediately) plus the optional
    /// interval and status poller.
    pub fn start(&self, opts: LiveOptions) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            loop {
                inner.refresh().await;
                // signals raised during the fetch leave one stored permit
                inner.changed.notified().await;
            }
        }));

        if let Some(period) = opts.refresh_every.filter(|p| !p.is_zero()) {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    inner.changed.notify_one();
                }
            }));
        }

        if let Some(url) = opts.status_url.filter(|u| !u.trim().is_empty()) {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(async move {
                let client = reqwest::Client::new();
                let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
                loop {
                    ticker.tick().await;
                    let status = poll_status(&client, &url).await;
                    inner.status.send_replace(Some(status));
                }
            }));
        }
    }

    /// Zero-payload "data changed" signal. Signals that arrive while a fetch is
    /// running collapse into a single follow-up fetch.
    pub fn notify_changed(&self) {
        self.inner.changed.notify_one();
    }

    /// Fetch now, outside the worker. Returns whether the result was published.
    pub async fn refresh(&self) -> bool {
        self.inner.refresh().await
    }

    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DirectorySnapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.fetch.borrow().last_error.clone()
    }

    pub fn stats(&self) -> DirectoryStats {
        let snapshot = self.snapshot();
        let fetch = self.inner.fetch.borrow().clone();
        DirectoryStats {
            total: snapshot.engine.len(),
            generation: snapshot.generation,
            last_updated: snapshot.last_updated_secs(),
            loading: fetch.in_flight > 0,
            error: fetch.last_error,
            status: self.inner.status.borrow().clone(),
        }
    }

    /// Stop background work. No timer fires after this returns.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for LiveDirectory {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Trailing-edge debounce: only text that stays unchanged for `delay` is
/// committed.
pub struct Debouncer {
    delay: Duration,
    committed: Arc<watch::Sender<String>>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            committed: Arc::new(watch::Sender::new(String::new())),
            pending: None,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn push(&mut self, text: impl Into<String>) {
        self.cancel();
        let text = text.into();
        let delay = self.delay;
        let committed = Arc::clone(&self.committed);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            committed.send_replace(text);
        }));
    }

    pub fn committed(&self) -> String {
        self.committed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.committed.subscribe()
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Per-consumer filter and sort state. Survives snapshot replacement.
pub struct SearchSession {
    filter: FilterState,
    sort: SortState,
    display: DisplayOptions,
    search: Debouncer,
}

impl SearchSession {
    pub fn new(display: DisplayOptions) -> Self {
        Self::with_debounce(display, SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(display: DisplayOptions, delay: Duration) -> Self {
        Self {
            filter: FilterState::default(),
            sort: SortState::default(),
            display,
            search: Debouncer::new(delay),
        }
    }

    /// Keystroke input; takes effect after the debounce delay.
    pub fn type_search(&mut self, text: impl Into<String>) {
        self.search.push(text);
    }

    pub fn toggle_specialty(&mut self, specialty: &str) {
        self.filter.toggle_specialty(specialty);
    }

    pub fn toggle_state(&mut self, state: &str) {
        self.filter.toggle_state(state);
    }

    pub fn sort_by(&mut self, column: SortColumn) {
        self.sort.toggle(column);
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn set_display(&mut self, display: DisplayOptions) {
        self.display = display;
    }

    /// The filter as applied: selections plus the committed search text.
    pub fn filter(&self) -> FilterState {
        FilterState {
            search_text: self.search.committed(),
            ..self.filter.clone()
        }
    }

    pub fn results(&self, snapshot: &DirectorySnapshot) -> ReviewerSearchResponse {
        snapshot
            .engine
            .search(&self.filter(), self.sort, self.display)
    }
}
