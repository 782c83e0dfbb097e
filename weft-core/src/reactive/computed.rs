//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs at construction. The first read evaluates the function
//!    inside a tracking context and caches the result.
//!
//! 2. Later reads return the cache while it is clean.
//!
//! 3. When any source read during the last evaluation changes, the runtime
//!    marks the computed dirty and passes the invalidation on to whatever
//!    depends on the computed itself.
//!
//! 4. The next read re-evaluates. Computed values that are never read again
//!    stay dirty and cost nothing.
//!
//! # Purity
//!
//! Evaluation must not write signals. A write attempted during evaluation
//! fails with [`ReactiveError::WriteInComputed`](crate::error::ReactiveError)
//! (and `Signal::set` panics on it), which rules out evaluation cycles.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::context::{ContextKind, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, SubscriberId};

/// Dirty state for a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// The computed must re-evaluate on next read.
    Dirty,
}

struct ComputedInner<T> {
    source_id: SourceId,
    subscriber_id: SubscriberId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: Mutex<ComputedState>,
    dependencies: Mutex<Vec<SourceId>>,
    evaluations: AtomicUsize,
    handle: Mutex<Option<ReactiveHandle>>,
}

impl<T> Reactive for ComputedInner<T>
where
    T: Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn source_id(&self) -> Option<SourceId> {
        Some(self.source_id)
    }

    fn mark_dirty(&self) -> bool {
        let mut state = self.state.lock();
        let was_clean = *state == ComputedState::Clean;
        *state = ComputedState::Dirty;
        was_clean
    }

    fn mark_clean(&self) {}

    fn run(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::clear_dependencies(self.subscriber_id, &self.dependencies.lock());
        Runtime::forget_source(self.source_id);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// Clones share the cache.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let doubled = {
///     let count = count.clone();
///     Computed::new(move || count.get() * 2)
/// };
/// assert_eq!(doubled.get(), 4);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new computed value.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let inner = Arc::new(ComputedInner {
            source_id: SourceId::new(),
            subscriber_id,
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: Mutex::new(ComputedState::Dirty),
            dependencies: Mutex::new(Vec::new()),
            evaluations: AtomicUsize::new(0),
            handle: Mutex::new(None),
        });
        *inner.handle.lock() = Some(Runtime::register(&inner));

        Self { inner }
    }

    /// The source ID dependents use to track this value.
    pub fn id(&self) -> SourceId {
        self.inner.source_id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            if ReactiveContext::track_dependency(self.inner.source_id) {
                Runtime::add_dependency(self.inner.source_id, subscriber);
            }
        }

        if self.state() == ComputedState::Clean {
            if let Some(value) = self.inner.value.read().as_ref() {
                return value.clone();
            }
        }

        self.recompute()
    }

    /// Re-evaluate within a tracking context and cache the result.
    fn recompute(&self) -> T {
        let inner = &self.inner;

        let stale = std::mem::take(&mut *inner.dependencies.lock());
        Runtime::clear_dependencies(inner.subscriber_id, &stale);

        let (value, dependencies) = {
            let _ctx = ReactiveContext::enter(inner.subscriber_id, ContextKind::Computed);
            let value = (inner.compute)();
            (value, ReactiveContext::get_dependencies())
        };

        trace!(
            computed = inner.source_id.raw(),
            dependencies = dependencies.len(),
            "computed re-evaluated"
        );

        *inner.dependencies.lock() = dependencies;
        *inner.value.write() = Some(value.clone());
        *inner.state.lock() = ComputedState::Clean;
        inner.evaluations.fetch_add(1, Ordering::Relaxed);

        value
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.lock()
    }

    /// How many times the function has been evaluated.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of sources read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.source_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
