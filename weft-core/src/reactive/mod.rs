//! Reactive Primitives
//!
//! This module implements the reactive system the engines are built on:
//! signals, computed values, and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (a computed or effect evaluation), the signal
//! registers that context as a dependent. Every write notifies dependents.
//!
//! ## Computed
//!
//! A Computed is a derived value that caches its result. It re-evaluates
//! lazily, on the first read after one of its dependencies changed, and may
//! never write a signal.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever its
//! dependencies change. Effects push reactive state out to collaborators.
//!
//! ## Batches
//!
//! [`batch`] defers effects until the closure returns; each affected effect
//! then runs once and only sees final values.
//!
//! # Implementation Notes
//!
//! Dependency tracking uses an explicit thread-local stack of tracking
//! frames (see [`ReactiveContext`]). Evaluating a computed or effect pushes a
//! frame; every read attributes itself to the top frame; the frame is popped
//! when the evaluation finishes.

mod batch;
mod computed;
mod context;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use batch::{batch, is_batching, BatchGuard, MAX_FLUSH_PASSES};
pub use computed::{Computed, ComputedState};
pub use context::{untracked, ContextKind, ReactiveContext};
pub use effect::Effect;
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
pub use subscriber::{SourceId, SubscriberId};

/// Create a [`Signal`].
pub fn signal<T>(initial: T) -> Signal<T>
where
    T: Send + Sync + 'static,
{
    Signal::new(initial)
}

/// Create a [`Computed`].
pub fn computed<T, F>(f: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(f)
}

/// Create an [`Effect`]; the returned handle is its disposer.
pub fn effect<F>(f: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(f)
}
