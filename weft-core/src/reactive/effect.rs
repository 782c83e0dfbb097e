//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued on the current batch
//!    and re-runs once when the batch flushes.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Differences from Computed
//!
//! - Computed values return a value; effects do not.
//! - Computed values are lazy (compute on access); effects are eager.
//!
//! # Disposal
//!
//! The [`Effect`] handle is the disposer. [`Effect::dispose`] or dropping the
//! last clone unsubscribes from every dependency.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::context::{ContextKind, ReactiveContext};
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::{SourceId, SubscriberId};

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    dependencies: Mutex<Vec<SourceId>>,
    disposed: AtomicBool,
    pending: AtomicBool,
    run_count: AtomicUsize,
    handle: Mutex<Option<ReactiveHandle>>,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.pending.store(false, Ordering::SeqCst);

        let stale = std::mem::take(&mut *self.dependencies.lock());
        Runtime::clear_dependencies(self.subscriber_id, &stale);

        let dependencies = {
            let _ctx = ReactiveContext::enter(self.subscriber_id, ContextKind::Effect);
            (self.run)();
            ReactiveContext::get_dependencies()
        };

        trace!(
            effect = self.subscriber_id.raw(),
            dependencies = dependencies.len(),
            "effect ran"
        );

        *self.dependencies.lock() = dependencies;
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let stale = std::mem::take(&mut *self.dependencies.lock());
        Runtime::clear_dependencies(self.subscriber_id, &stale);
        self.handle.lock().take();
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn source_id(&self) -> Option<SourceId> {
        None
    }

    fn mark_dirty(&self) -> bool {
        !self.disposed.load(Ordering::SeqCst) && !self.pending.swap(true, Ordering::SeqCst)
    }

    fn mark_clean(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }

    fn run(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        Runtime::clear_dependencies(self.subscriber_id, &self.dependencies.lock());
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use weft_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(AtomicI32::new(-1));
///
/// let effect = {
///     let (count, seen) = (count.clone(), seen.clone());
///     Effect::new(move || seen.store(count.get(), Ordering::SeqCst))
/// };
///
/// count.set(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            dependencies: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            handle: Mutex::new(None),
        });
        *inner.handle.lock() = Some(Runtime::register(&inner));

        inner.execute();

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect function now, outside the batch machinery.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
