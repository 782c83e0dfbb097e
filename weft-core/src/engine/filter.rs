//! Filter/Sort State Machine
//!
//! [`FilterEngine`] holds the active [`FilterState`] for one page window and
//! moves between two phases:
//!
//! ```text
//!   Idle --set_filter/reset_filter/set_sort--> Filtering --fetch done--> Idle
//! ```
//!
//! Every change reloads the window from the first page. Cursors from the
//! previous predicate are dropped before the fetch, never reused.
//!
//! The sort order lives in the paginator's query. Each change starts from
//! [`Paginator::current_query`], so a sort set directly on the paginator is
//! kept by the next filter change.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::pagination::Paginator;
use crate::query::{FilterState, Predicate, Query, SortSpec};
use crate::reactive::{batch, Computed, Signal};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPhase {
    #[default]
    Idle,
    /// A fetch for the latest filter state is in flight.
    Filtering,
}

pub struct FilterEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    paginator: Arc<Paginator<T>>,
    state: Signal<FilterState>,
    phase: Signal<FilterPhase>,
    is_filtered: Computed<bool>,
    pending: AtomicUsize,
}

impl<T> FilterEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a paginator, starting from whatever filter its current query has.
    pub fn new(paginator: Arc<Paginator<T>>) -> Self {
        let query = paginator.current_query();
        let state = Signal::new(FilterState {
            predicate: query.filter,
            sort: query.sort,
        });
        let is_filtered = {
            let state = state.clone();
            Computed::new(move || state.with(FilterState::is_filtered))
        };

        Self {
            paginator,
            state,
            phase: Signal::new(FilterPhase::Idle),
            is_filtered,
            pending: AtomicUsize::new(0),
        }
    }

    pub fn paginator(&self) -> &Arc<Paginator<T>> {
        &self.paginator
    }

    pub fn state(&self) -> FilterState {
        self.state.get()
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase.get()
    }

    pub fn is_filtered(&self) -> bool {
        self.is_filtered.get()
    }

    /// Replace the predicate and reload from page one.
    pub async fn set_filter(&self, predicate: Predicate) {
        let sort = self.paginator.current_query().sort;
        self.apply(FilterState { predicate, sort }).await;
    }

    /// Set one field of the predicate, keeping the rest.
    pub async fn update_filter(&self, field: impl Into<String>, value: impl Into<Value>) {
        let mut next = self.current();
        next.predicate.insert(field.into(), value.into());
        self.apply(next).await;
    }

    /// Drop one field from the predicate.
    pub async fn remove_filter(&self, field: &str) {
        let mut next = self.current();
        if next.predicate.shift_remove(field).is_none() {
            return;
        }
        self.apply(next).await;
    }

    /// Clear the predicate and reload unfiltered.
    pub async fn reset_filter(&self) {
        self.set_filter(Predicate::new()).await;
    }

    /// Replace the sort order and reload from page one.
    pub async fn set_sort(&self, sort: Vec<SortSpec>) {
        let predicate = self.state.with_untracked(|state| state.predicate.clone());
        self.apply(FilterState { predicate, sort }).await;
    }

    fn current(&self) -> FilterState {
        FilterState {
            predicate: self.state.with_untracked(|state| state.predicate.clone()),
            sort: self.paginator.current_query().sort,
        }
    }

    async fn apply(&self, next: FilterState) {
        let _pending = PendingChange::enter(&self.pending, &self.phase);
        batch(|| {
            self.state.set(next.clone());
            self.phase.set(FilterPhase::Filtering);
        });
        debug!(fields = next.predicate.len(), sort_keys = next.sort.len(), "filter changed");

        let limit = self.paginator.current_query().limit;
        let query = Query {
            limit,
            skip: None,
            filter: next.predicate,
            sort: next.sort,
        };
        self.paginator.load_items(query).await;
    }
}

/// One outstanding filter change. The last one to end, whether it finished
/// or was cancelled, returns the phase to `Idle`.
struct PendingChange<'a> {
    pending: &'a AtomicUsize,
    phase: &'a Signal<FilterPhase>,
}

impl<'a> PendingChange<'a> {
    fn enter(pending: &'a AtomicUsize, phase: &'a Signal<FilterPhase>) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self { pending, phase }
    }
}

impl Drop for PendingChange<'_> {
    fn drop(&mut self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.phase.set(FilterPhase::Idle);
        }
    }
}

impl<T> std::fmt::Debug for FilterEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("state", &self.state.peek())
            .field("phase", &self.phase.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PaginationConfig;
    use crate::error::FetchError;
    use crate::query::{DataFetcher, PageResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        queries: Mutex<Vec<Query>>,
    }

    #[async_trait]
    impl DataFetcher<u8> for Recorder {
        async fn find(&self, query: Query) -> Result<PageResult<u8>, FetchError> {
            self.queries.lock().push(query);
            Ok(PageResult::new(vec![1]))
        }
    }

    fn engine() -> (Arc<Recorder>, FilterEngine<u8>) {
        let recorder = Arc::new(Recorder::default());
        let paginator =
            Paginator::new(PaginationConfig::for_collection("things"), recorder.clone()).unwrap();
        (recorder, FilterEngine::new(Arc::new(paginator)))
    }

    #[tokio::test]
    async fn update_and_remove_single_fields() {
        let (recorder, engine) = engine();

        engine.update_filter("color", "red").await;
        engine.update_filter("size", 42).await;
        assert_eq!(engine.state().predicate.len(), 2);

        engine.remove_filter("color").await;
        let last = recorder.queries.lock().last().cloned().unwrap();
        assert_eq!(last.filter.get("size"), Some(&json!(42)));
        assert!(!last.filter.contains_key("color"));

        // Removing an absent field does not refetch.
        let before = recorder.queries.lock().len();
        engine.remove_filter("color").await;
        assert_eq!(recorder.queries.lock().len(), before);
    }

    struct Stalled;

    #[async_trait]
    impl DataFetcher<u8> for Stalled {
        async fn find(&self, _query: Query) -> Result<PageResult<u8>, FetchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancelled_change_returns_to_idle() {
        let paginator =
            Paginator::new(PaginationConfig::for_collection("things"), Arc::new(Stalled)).unwrap();
        let engine = FilterEngine::new(Arc::new(paginator));

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(5),
            engine.update_filter("color", "red"),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(engine.phase(), FilterPhase::Idle);
        assert!(!engine.paginator().is_loading());
        assert!(engine.is_filtered());
    }

    #[tokio::test]
    async fn sort_set_on_the_paginator_survives_filter_changes() {
        let (recorder, engine) = engine();
        engine
            .paginator()
            .set_sort(vec![SortSpec::asc("name")])
            .await;

        engine.update_filter("color", "red").await;
        assert_eq!(engine.state().sort, vec![SortSpec::asc("name")]);
        let last = recorder.queries.lock().last().cloned().unwrap();
        assert_eq!(last.sort, vec![SortSpec::asc("name")]);
    }

    #[tokio::test]
    async fn sort_changes_keep_the_predicate() {
        let (recorder, engine) = engine();
        engine.update_filter("color", "red").await;
        engine.set_sort(vec![SortSpec::desc("price")]).await;

        let last = recorder.queries.lock().last().cloned().unwrap();
        assert_eq!(last.sort, vec![SortSpec::desc("price")]);
        assert_eq!(last.filter.get("color"), Some(&json!("red")));
        assert_eq!(last.skip, None);
        assert_eq!(engine.phase(), FilterPhase::Idle);
    }
}
