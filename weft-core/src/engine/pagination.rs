//! Cursor Pagination Engine
//!
//! A [`Paginator`] owns one page window: the items fetched so far, the
//! collaborator's forward/backward cursors, and loading/error state. All of
//! it is exposed through tracked accessors, so computed values and effects
//! built on top re-run when the window changes.
//!
//! # Fetch discipline
//!
//! - Following a cursor while a fetch is in flight is a no-op, not queued.
//! - Starting a fresh query ([`Paginator::load_items`], [`Paginator::invalidate`])
//!   opens a new request epoch. Responses are applied by a single function,
//!   [`Paginator::apply_fetch_result`], which drops any response belonging to
//!   an older epoch, so a slow request can never overwrite a newer window.
//! - Failures keep the items already shown and only fill `error`.
//! - A fetch whose future is dropped releases the in-flight gate and
//!   `is_loading` on the way out, unless a newer epoch already owns them.
//! - `has_next` / `has_prev` mirror the presence of the collaborator's
//!   cursors; they are never inferred from how many items came back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::constraint::{apply_bounds, Bounds};
use super::snapshot::PageSnapshot;
use crate::error::{Error, FetchError, ValidationError};
use crate::poll::{poll_until, PollOptions};
use crate::query::{Cursor, DataFetcher, Mutator, PageResult, Query, SortSpec};
use crate::reactive::{batch, Computed, Signal};
use crate::service::ServiceScope;

/// Configuration for one page window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Collection the window reads from. Must not be empty.
    pub collection_id: String,
    pub page_size: usize,
    pub max_page_size: usize,
    /// When set, [`Paginator::create_item`] waits for the new item to become
    /// visible before refreshing.
    pub settle: Option<PollOptions>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            collection_id: String::new(),
            page_size: 20,
            max_page_size: 100,
            settle: None,
        }
    }
}

impl PaginationConfig {
    pub fn for_collection(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

/// How a successful page lands in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Replace, with the window now starting at `start`.
    Replace { start: usize },
    Append,
    /// Replace, moving the window start back by the page length.
    ReplaceBackward,
}

struct Cursors<T> {
    next: Option<Cursor<T>>,
    prev: Option<Cursor<T>>,
}

impl<T> Cursors<T> {
    fn empty() -> Self {
        Self {
            next: None,
            prev: None,
        }
    }

    fn get(&self, direction: Direction) -> Option<&Cursor<T>> {
        match direction {
            Direction::Next => self.next.as_ref(),
            Direction::Prev => self.prev.as_ref(),
        }
    }
}

pub struct Paginator<T>
where
    T: Clone + Send + Sync + 'static,
{
    config: PaginationConfig,
    fetcher: Arc<dyn DataFetcher<T>>,

    items: Signal<Vec<T>>,
    total_count: Signal<Option<usize>>,
    is_loading: Signal<bool>,
    error: Signal<Option<String>>,
    has_next: Signal<bool>,
    has_prev: Signal<bool>,
    page_count: Computed<Option<usize>>,

    query: Mutex<Query>,
    window_start: Mutex<usize>,
    cursors: Mutex<Cursors<T>>,
    epoch: AtomicU64,
    in_flight: AtomicBool,
}

impl<T> Paginator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty window. Nothing is fetched until [`Paginator::load_items`].
    pub fn new(
        config: PaginationConfig,
        fetcher: Arc<dyn DataFetcher<T>>,
    ) -> Result<Self, ValidationError> {
        if config.collection_id.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier {
                field: "collection_id",
            });
        }

        let total_count = Signal::new(None);
        let page_size = config.page_size.max(1);
        let page_count = {
            let total_count = total_count.clone();
            Computed::new(move || total_count.get().map(|total: usize| total.div_ceil(page_size)))
        };
        let query = Query::new().with_limit(page_size);

        Ok(Self {
            fetcher,
            items: Signal::new(Vec::new()),
            total_count,
            is_loading: Signal::new(false),
            error: Signal::new(None),
            has_next: Signal::new(false),
            has_prev: Signal::new(false),
            page_count,
            query: Mutex::new(query),
            window_start: Mutex::new(0),
            cursors: Mutex::new(Cursors::empty()),
            epoch: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            config,
        })
    }

    /// Create a window pre-filled from a server-computed snapshot.
    ///
    /// Continuations are rebuilt as offset cursors over the snapshot's query.
    pub fn seeded(
        config: PaginationConfig,
        fetcher: Arc<dyn DataFetcher<T>>,
        snapshot: PageSnapshot<T>,
    ) -> Result<Self, ValidationError> {
        let paginator = Self::new(config, fetcher)?;
        let limit = paginator.clamp_limit(snapshot.query.limit);
        let start = snapshot.window_start;
        let len = snapshot.items.len();

        {
            let mut cursors = paginator.cursors.lock();
            if snapshot.has_next {
                let query = snapshot.query.clone().with_skip(start + len).with_limit(limit);
                cursors.next = Some(Cursor::offset(Arc::clone(&paginator.fetcher), query));
            }
            if snapshot.has_prev {
                let query = snapshot
                    .query
                    .clone()
                    .with_skip(start.saturating_sub(limit))
                    .with_limit(limit.min(start).max(1));
                cursors.prev = Some(Cursor::offset(Arc::clone(&paginator.fetcher), query));
            }
        }

        *paginator.query.lock() = snapshot.query.with_limit(limit);
        *paginator.window_start.lock() = start;
        batch(|| {
            paginator.items.set(snapshot.items);
            paginator.total_count.set(snapshot.total_count);
            paginator.has_next.set(snapshot.has_next);
            paginator.has_prev.set(snapshot.has_prev);
        });
        debug!(collection = %paginator.config.collection_id, items = len, "window seeded");

        Ok(paginator)
    }

    /// Factory for a [`ServiceScope`]: the fetcher comes from the scope's
    /// context as an `Arc<dyn DataFetcher<T>>`.
    pub fn from_scope(scope: &ServiceScope, config: PaginationConfig) -> Result<Self, Error> {
        let fetcher = scope.context().require::<Arc<dyn DataFetcher<T>>>()?;
        Ok(Self::new(config, Arc::clone(fetcher.as_ref()))?)
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Reads (tracked)
    // ------------------------------------------------------------------

    pub fn items(&self) -> Vec<T> {
        self.items.get()
    }

    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.items.with(|items| f(items.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.items.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_count(&self) -> Option<usize> {
        self.total_count.get()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.get()
    }

    pub fn error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn has_next(&self) -> bool {
        self.has_next.get()
    }

    pub fn has_prev(&self) -> bool {
        self.has_prev.get()
    }

    /// Pages in the whole collection at the configured page size, when the
    /// collaborator reported a total.
    pub fn page_count(&self) -> Option<usize> {
        self.page_count.get()
    }

    /// The query the current window was loaded with.
    pub fn current_query(&self) -> Query {
        self.query.lock().clone()
    }

    /// Offset of the first item in the window.
    pub fn window_start(&self) -> usize {
        *self.window_start.lock()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Replace the window with the first page of `query`.
    ///
    /// Cursors from the previous query are discarded before fetching.
    pub async fn load_items(&self, query: Query) {
        let query = Query {
            limit: Some(self.clamp_limit(query.limit)),
            ..query
        };
        *self.query.lock() = query.clone();
        *self.cursors.lock() = Cursors::empty();

        let epoch = self.open_epoch(true);
        debug!(collection = %self.config.collection_id, epoch, skip = query.skip_or_zero(), "loading items");

        let start = query.skip_or_zero();
        let fetch = FetchGuard::new(self, epoch);
        let result = self.fetcher.find(query).await;
        fetch.settle(Placement::Replace { start }, result);
    }

    /// Append the page behind the `next` cursor.
    pub async fn load_next_page(&self) {
        self.follow(Direction::Next).await;
    }

    /// Replace the window with the page behind the `prev` cursor.
    pub async fn load_prev_page(&self) {
        self.follow(Direction::Prev).await;
    }

    async fn follow(&self, direction: Direction) {
        let cursor = match self.cursors.lock().get(direction).cloned() {
            Some(cursor) => cursor,
            None => return,
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(?direction, "fetch already in flight; ignoring");
            return;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        batch(|| {
            self.is_loading.set(true);
            self.error.set(None);
        });
        debug!(collection = %self.config.collection_id, epoch, ?direction, "following cursor");

        let fetch = FetchGuard::new(self, epoch);
        let result = cursor.fetch().await;
        let placement = match direction {
            Direction::Next => Placement::Append,
            Direction::Prev => Placement::ReplaceBackward,
        };
        fetch.settle(placement, result);
    }

    /// Re-fetch the current window position after a mutation.
    ///
    /// Keeps the window start and at least as many items as are shown.
    pub async fn invalidate(&self) {
        let start = self.window_start();
        let shown = self.items.with_untracked(Vec::len);
        let base = self.current_query();
        let limit = base.limit.unwrap_or(self.config.page_size).max(shown).max(1);
        let query = base.with_skip(start).with_limit(limit);

        let epoch = self.open_epoch(false);
        debug!(collection = %self.config.collection_id, epoch, skip = start, limit, "invalidating window");

        let fetch = FetchGuard::new(self, epoch);
        let result = self.fetcher.find(query).await;
        fetch.settle(Placement::Replace { start }, result);
    }

    /// Store a new sort order and reload from the first page.
    ///
    /// A [`FilterEngine`](super::FilterEngine) wrapping this window picks the
    /// new order up on its next change.
    pub async fn set_sort(&self, sort: Vec<SortSpec>) {
        let query = Query {
            skip: None,
            sort,
            ..self.current_query()
        };
        self.load_items(query).await;
    }

    /// Insert through `mutator`, then refresh the current window.
    ///
    /// Returns the stored item; on failure the message lands in `error` and
    /// nothing else changes.
    pub async fn create_item<D>(&self, mutator: &dyn Mutator<T, D>, draft: D) -> Option<T>
    where
        D: Send + 'static,
    {
        self.error.set(None);

        let created = match mutator.insert(draft).await {
            Ok(created) => created,
            Err(err) => {
                warn!(collection = %self.config.collection_id, error = %err, "insert failed");
                self.error.set(Some(err.to_string()));
                return None;
            }
        };

        if let Some(settle) = self.config.settle {
            if !poll_until(settle, || mutator.is_visible(&created)).await {
                debug!(collection = %self.config.collection_id, "created item not visible yet; refreshing anyway");
            }
        }

        self.invalidate().await;
        Some(created)
    }

    /// Plain-data copy of the window.
    pub fn snapshot(&self) -> PageSnapshot<T> {
        PageSnapshot {
            items: self.items.peek(),
            total_count: self.total_count.peek(),
            has_next: self.has_next.peek(),
            has_prev: self.has_prev.peek(),
            query: self.current_query(),
            window_start: self.window_start(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn clamp_limit(&self, limit: Option<usize>) -> usize {
        let requested = limit.unwrap_or(self.config.page_size);
        let max = self.config.max_page_size.max(1);
        let bounds = Bounds::new(1, max as u64);
        let applied = apply_bounds(i64::try_from(requested).unwrap_or(i64::MAX), bounds).value();
        usize::try_from(applied).unwrap_or(max)
    }

    /// Start a fetch that supersedes everything in flight.
    fn open_epoch(&self, clear_cursors: bool) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.store(true, Ordering::SeqCst);
        batch(|| {
            self.is_loading.set(true);
            self.error.set(None);
            if clear_cursors {
                self.has_next.set(false);
                self.has_prev.set(false);
            }
        });
        epoch
    }

    /// The single place fetch results touch the window.
    ///
    /// Returns whether the result belonged to the current epoch.
    fn apply_fetch_result(
        &self,
        epoch: u64,
        placement: Placement,
        result: Result<PageResult<T>, FetchError>,
    ) -> bool {
        let current = self.epoch.load(Ordering::SeqCst);
        if epoch != current {
            debug!(epoch, current, "discarding stale fetch result");
            return false;
        }

        match result {
            Ok(page) => {
                let PageResult {
                    items,
                    total_count,
                    next,
                    prev,
                } = page;
                let (has_next, has_prev) = (next.is_some(), prev.is_some());
                let received = items.len();
                *self.cursors.lock() = Cursors { next, prev };

                {
                    let mut start = self.window_start.lock();
                    match placement {
                        Placement::Replace { start: new_start } => *start = new_start,
                        Placement::ReplaceBackward => *start = start.saturating_sub(received),
                        Placement::Append => {}
                    }
                }

                batch(|| {
                    match placement {
                        Placement::Append => self.items.modify(|window| window.extend(items)),
                        Placement::Replace { .. } | Placement::ReplaceBackward => {
                            self.items.set(items)
                        }
                    }
                    if total_count.is_some() || placement != Placement::Append {
                        self.total_count.set(total_count);
                    }
                    self.has_next.set(has_next);
                    self.has_prev.set(has_prev);
                    self.error.set(None);
                    self.finish();
                });
                debug!(
                    collection = %self.config.collection_id,
                    epoch,
                    received,
                    has_next,
                    has_prev,
                    "page applied"
                );
            }
            Err(err) => {
                warn!(collection = %self.config.collection_id, epoch, error = %err, "fetch failed");
                batch(|| {
                    self.error.set(Some(err.to_string()));
                    self.finish();
                });
            }
        }

        true
    }

    fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
        self.is_loading.set(false);
    }
}

/// Ties one outstanding fetch to its epoch.
///
/// Dropping the guard without settling it (the fetch future was cancelled)
/// releases the in-flight gate and clears `is_loading`, unless a newer epoch
/// has taken over the window.
struct FetchGuard<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    paginator: &'a Paginator<T>,
    epoch: u64,
    settled: bool,
}

impl<'a, T> FetchGuard<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(paginator: &'a Paginator<T>, epoch: u64) -> Self {
        Self {
            paginator,
            epoch,
            settled: false,
        }
    }

    fn settle(mut self, placement: Placement, result: Result<PageResult<T>, FetchError>) -> bool {
        self.settled = true;
        self.paginator
            .apply_fetch_result(self.epoch, placement, result)
    }
}

impl<T> Drop for FetchGuard<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let current = self.paginator.epoch.load(Ordering::SeqCst);
        if self.epoch != current {
            return;
        }
        debug!(
            collection = %self.paginator.config.collection_id,
            epoch = self.epoch,
            "fetch dropped before completion"
        );
        batch(|| self.paginator.finish());
    }
}

impl<T> std::fmt::Debug for Paginator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("collection_id", &self.config.collection_id)
            .field("items", &self.items.with_untracked(Vec::len))
            .field("is_loading", &self.is_loading.peek())
            .field("has_next", &self.has_next.peek())
            .field("has_prev", &self.has_prev.peek())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Numbers {
        total: usize,
    }

    #[async_trait]
    impl DataFetcher<usize> for Numbers {
        async fn find(&self, query: Query) -> Result<PageResult<usize>, FetchError> {
            let skip = query.skip_or_zero();
            let limit = query.limit.unwrap_or(10);
            let end = (skip + limit).min(self.total);
            Ok(PageResult::new((skip..end).collect()).with_total(self.total))
        }
    }

    fn paginator(config: PaginationConfig) -> Paginator<usize> {
        Paginator::new(config, Arc::new(Numbers { total: 500 })).unwrap()
    }

    #[test]
    fn empty_collection_id_is_rejected() {
        let err = Paginator::<usize>::new(
            PaginationConfig::default(),
            Arc::new(Numbers { total: 0 }),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EmptyIdentifier {
                field: "collection_id"
            }
        );
    }

    #[test]
    fn limit_is_clamped_to_configured_range() {
        let p = paginator(PaginationConfig {
            max_page_size: 50,
            ..PaginationConfig::for_collection("numbers")
        });
        assert_eq!(p.clamp_limit(Some(0)), 1);
        assert_eq!(p.clamp_limit(Some(80)), 50);
        assert_eq!(p.clamp_limit(None), 20);
    }

    #[tokio::test]
    async fn load_items_clamps_and_reports_totals() {
        let p = paginator(PaginationConfig::for_collection("numbers"));
        p.load_items(Query::new().with_limit(1_000)).await;

        assert_eq!(p.len(), 100);
        assert_eq!(p.total_count(), Some(500));
        assert_eq!(p.page_count(), Some(25));
        assert!(!p.is_loading());
        // No cursor from the collaborator means no next page, whatever the count.
        assert!(!p.has_next());
    }

    struct Stalled;

    #[async_trait]
    impl DataFetcher<usize> for Stalled {
        async fn find(&self, _query: Query) -> Result<PageResult<usize>, FetchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancelled_load_releases_the_window() {
        let p = Paginator::new(PaginationConfig::for_collection("numbers"), Arc::new(Stalled))
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_millis(5), p.load_items(Query::new())).await;
        assert!(outcome.is_err());
        assert!(!p.is_loading());
        assert!(!p.in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_superseded_fetch_leaves_newer_epoch_alone() {
        let p = paginator(PaginationConfig::for_collection("numbers"));
        let first = p.open_epoch(true);
        let stale = FetchGuard::new(&p, first);
        let _current = p.open_epoch(true);

        drop(stale);
        assert!(p.is_loading());
        assert!(p.in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stale_results_are_discarded() {
        let p = paginator(PaginationConfig::for_collection("numbers"));
        let first = p.open_epoch(true);
        let second = p.open_epoch(true);

        let stale = PageResult::new(vec![1, 2, 3]);
        assert!(!p.apply_fetch_result(first, Placement::Replace { start: 0 }, Ok(stale)));
        assert!(p.is_empty());
        assert!(p.is_loading());

        let fresh = PageResult::new(vec![9]);
        assert!(p.apply_fetch_result(second, Placement::Replace { start: 0 }, Ok(fresh)));
        assert_eq!(p.items(), vec![9]);
        assert!(!p.is_loading());
    }
}
