//! Collaborator contracts: fetching pages, following cursors, inserting.
//!
//! The engines never talk to a transport. They call a [`DataFetcher`] for
//! first pages, follow the [`Cursor`]s it hands back, and treat everything
//! else about the collaborator as opaque. In particular page sizes are not
//! assumed to be uniform: whether more data exists is the collaborator's
//! call, reported by the presence of a cursor.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};

use super::types::Query;
use crate::error::FetchError;

pub type PageFuture<T> = BoxFuture<'static, Result<PageResult<T>, FetchError>>;

/// Opaque continuation that fetches an adjacent page.
///
/// Invoking a cursor does not consume it; the pagination engine replaces a
/// cursor with the one returned by its own result once that result is
/// applied, and keeps it when the fetch failed so it can be retried.
pub struct Cursor<T> {
    fetch: Arc<dyn Fn() -> PageFuture<T> + Send + Sync>,
}

impl<T> Cursor<T>
where
    T: Send + 'static,
{
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageResult<T>, FetchError>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move || fetch().boxed()),
        }
    }

    /// A cursor that re-issues `query` against `fetcher`.
    ///
    /// Used where the collaborator's own continuation is not available, e.g.
    /// for a window restored from a snapshot.
    pub fn offset(fetcher: Arc<dyn DataFetcher<T>>, query: Query) -> Self {
        Self::new(move || {
            let fetcher = Arc::clone(&fetcher);
            let query = query.clone();
            async move { fetcher.find(query).await }
        })
    }

    pub fn fetch(&self) -> PageFuture<T> {
        (self.fetch)()
    }
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
        }
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cursor(..)")
    }
}

/// One page as returned by the collaborator.
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_count: Option<usize>,
    pub next: Option<Cursor<T>>,
    pub prev: Option<Cursor<T>>,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            total_count: None,
            next: None,
            prev: None,
        }
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total_count = Some(total);
        self
    }

    pub fn with_next(mut self, cursor: Cursor<T>) -> Self {
        self.next = Some(cursor);
        self
    }

    pub fn with_prev(mut self, cursor: Cursor<T>) -> Self {
        self.prev = Some(cursor);
        self
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_prev(&self) -> bool {
        self.prev.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for PageResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageResult")
            .field("items", &self.items)
            .field("total_count", &self.total_count)
            .field("has_next", &self.has_next())
            .field("has_prev", &self.has_prev())
            .finish()
    }
}

/// Reads pages of one entity type.
#[async_trait]
pub trait DataFetcher<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn find(&self, query: Query) -> Result<PageResult<T>, FetchError>;
}

/// Writes one entity type.
#[async_trait]
pub trait Mutator<T, D = T>: Send + Sync
where
    T: Send + Sync + 'static,
    D: Send + 'static,
{
    /// Create an item from a draft and return the stored item.
    async fn insert(&self, draft: D) -> Result<T, FetchError>;

    /// Whether a stored item is visible to reads yet.
    ///
    /// Backends with eventually consistent reads override this; the
    /// pagination engine polls it before refreshing after an insert.
    async fn is_visible(&self, _item: &T) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recording {
        queries: Mutex<Vec<Query>>,
    }

    #[async_trait]
    impl DataFetcher<u32> for Recording {
        async fn find(&self, query: Query) -> Result<PageResult<u32>, FetchError> {
            self.queries.lock().push(query.clone());
            Ok(PageResult::new(vec![query.skip_or_zero() as u32]))
        }
    }

    #[tokio::test]
    async fn offset_cursor_reissues_its_query() {
        let fetcher = Arc::new(Recording {
            queries: Mutex::new(Vec::new()),
        });
        let cursor = Cursor::offset(fetcher.clone(), Query::new().with_skip(20).with_limit(10));

        let first = cursor.fetch().await.unwrap();
        let again = cursor.clone().fetch().await.unwrap();

        assert_eq!(first.items, vec![20]);
        assert_eq!(again.items, vec![20]);
        assert_eq!(fetcher.queries.lock().len(), 2);
        assert!(!first.has_next());
    }
}
