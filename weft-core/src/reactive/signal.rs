//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read with [`Signal::get`] or [`Signal::with`] inside a
//!    reactive context (computed/effect), the current computation is recorded
//!    as a subscriber. [`Signal::peek`] never records anything.
//!
//! 2. [`Signal::set`] always notifies, even when the new value equals the old
//!    one. There is no equality check.
//!
//! 3. Notifications invalidate dependent computed values and queue dependent
//!    effects on the current batch.
//!
//! # Thread Safety
//!
//! The value sits behind a `parking_lot::RwLock`; the lock is never held
//! while subscribers run.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::Effect;
use super::runtime::Runtime;
use super::subscriber::SourceId;
use crate::error::ReactiveError;

struct SignalInner<T> {
    id: SourceId,
    value: RwLock<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::forget_source(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same cell.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SourceId::new(),
                value: RwLock::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    fn track(&self) {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            if ReactiveContext::track_dependency(self.inner.id) {
                Runtime::add_dependency(self.inner.id, subscriber);
            }
        }
    }

    /// Borrow the current value, registering a dependency when tracked.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&*self.inner.value.read())
    }

    /// Borrow the current value without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.read())
    }

    /// Replace the value and notify subscribers.
    ///
    /// # Panics
    ///
    /// Panics when called while a computed value is evaluating; computed
    /// evaluation must be pure. Use [`Signal::try_set`] to get the error
    /// instead.
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            panic!("{err}");
        }
    }

    /// Replace the value and notify subscribers, refusing writes from inside
    /// a computed evaluation.
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        self.try_modify(|slot| *slot = value)
    }

    /// Mutate the value in place and notify subscribers.
    ///
    /// # Panics
    ///
    /// Same rule as [`Signal::set`].
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        if let Err(err) = self.try_modify(f) {
            panic!("{err}");
        }
    }

    fn try_modify(&self, f: impl FnOnce(&mut T)) -> Result<(), ReactiveError> {
        if ReactiveContext::is_computing() {
            return Err(ReactiveError::WriteInComputed {
                signal: self.inner.id.raw(),
            });
        }

        {
            let mut guard = self.inner.value.write();
            f(&mut *guard);
        }

        trace!(signal = self.inner.id.raw(), "signal written");
        Runtime::notify_source_change(self.inner.id);
        Ok(())
    }

    /// Get the number of computations currently depending on this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> T {
        self.with_untracked(T::clone)
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = self.with_untracked(f);
        self.set(new_value);
    }

    /// Call `f` with the current value now and after every change.
    ///
    /// The returned effect is the subscription; dropping or disposing it
    /// unsubscribes.
    pub fn subscribe<F>(&self, f: F) -> Effect
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let signal = self.clone();
        Effect::new(move || f(signal.get()))
    }
}

impl<T> Clone for Signal<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T>
where
    T: Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Signal<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_untracked(|value| {
            f.debug_struct("Signal")
                .field("id", &self.inner.id)
                .field("value", value)
                .field("subscriber_count", &self.subscriber_count())
                .finish()
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
