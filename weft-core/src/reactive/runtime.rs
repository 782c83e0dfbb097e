//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computed
//! values, and effects. It owns the dependency edges and decides what runs
//! when a source changes.
//!
//! # How It Works
//!
//! 1. Computed values and effects register with the runtime when created.
//!
//! 2. When a computed or effect reads a source inside its tracking context,
//!    the runtime records the edge `source -> subscriber`.
//!
//! 3. When a source changes, the runtime:
//!    a. Finds all subscribers of that source
//!    b. Marks them dirty
//!    c. Propagates through dirty computed values to *their* subscribers
//!    d. Queues every reached effect on the current batch
//!    e. Flushes the batch unless one is open (see [`super::batch`])
//!
//! Computed values are lazy: marking them dirty is all that happens until
//! someone reads them.
//!
//! # Thread Safety
//!
//! Edges and the subscriber registry live in global concurrent maps so that
//! handles can be shared across threads. The tracking stack and the batch
//! queue are thread-local.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use tracing::trace;

use super::batch;
use super::context::ReactiveContext;
use super::subscriber::{SourceId, SubscriberId};

/// A trait for types that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// The source ID other subscribers use to depend on this value, if it
    /// can be read (computed values).
    fn source_id(&self) -> Option<SourceId>;

    /// Invalidate this reactive value.
    ///
    /// Returns `true` only when this call moved it from clean to dirty, so
    /// propagation stops at nodes that are already invalid.
    fn mark_dirty(&self) -> bool;

    /// Drop a pending invalidation without running.
    fn mark_clean(&self);

    /// Re-run this reactive value (effects only).
    fn run(&self);

    /// Check if this reactive value is an effect (eager) or computed (lazy).
    fn is_eager(&self) -> bool;
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Subscriber IDs to weak references, so registration never keeps a
// computed or effect alive.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();
static SOURCE_SUBSCRIBERS: OnceLock<DashMap<SourceId, IndexSet<SubscriberId>>> = OnceLock::new();

fn get_registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn get_source_subscribers() -> &'static DashMap<SourceId, IndexSet<SubscriberId>> {
    SOURCE_SUBSCRIBERS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped; the owner
    /// keeps the handle next to the value so both go away together.
    pub fn register<R>(reactive: &Arc<R>) -> ReactiveHandle
    where
        R: Reactive + 'static,
    {
        let id = reactive.subscriber_id();
        let weak = Arc::downgrade(reactive);
        let weak: Weak<dyn Reactive> = weak;
        get_registry().insert(id, weak);
        trace!(subscriber = id.raw(), "registered reactive");

        ReactiveHandle { subscriber_id: id }
    }

    /// Unregister a reactive value and every edge pointing at it.
    fn unregister(id: SubscriberId) {
        get_registry().remove(&id);

        for mut subs in get_source_subscribers().iter_mut() {
            subs.shift_remove(&id);
        }
        trace!(subscriber = id.raw(), "unregistered reactive");
    }

    /// Forget a source that no longer exists.
    pub fn forget_source(source: SourceId) {
        get_source_subscribers().remove(&source);
    }

    /// Record that a subscriber depends on a source.
    ///
    /// Called automatically when a source is read within a reactive context.
    pub fn add_dependency(source: SourceId, subscriber: SubscriberId) {
        get_source_subscribers()
            .entry(source)
            .or_default()
            .insert(subscriber);
        trace!(source = source.raw(), subscriber = subscriber.raw(), "dependency edge");
    }

    /// Remove a subscriber's edges from the given sources.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber: SubscriberId, sources: &[SourceId]) {
        let map = get_source_subscribers();
        for source in sources {
            if let Some(mut subs) = map.get_mut(source) {
                subs.shift_remove(&subscriber);
            }
        }
    }

    /// Number of subscribers currently depending on a source.
    pub fn subscriber_count(source: SourceId) -> usize {
        get_source_subscribers()
            .get(&source)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Notify all subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism.
    pub fn notify_source_change(source: SourceId) {
        let mut effects = Vec::new();
        Self::propagate(source, &mut effects);

        for effect in effects {
            batch::enqueue(effect);
        }
        batch::flush_if_idle();
    }

    fn propagate(source: SourceId, effects: &mut Vec<Arc<dyn Reactive>>) {
        // Snapshot the edge set so no map guard is held while calling out.
        let subscriber_ids: Vec<SubscriberId> = match get_source_subscribers().get(&source) {
            Some(subs) => subs.iter().copied().collect(),
            None => return,
        };

        for id in subscriber_ids {
            let reactive = match get_registry().get(&id).and_then(|weak| weak.upgrade()) {
                Some(reactive) => reactive,
                None => continue,
            };

            if !reactive.mark_dirty() {
                continue;
            }

            if reactive.is_eager() {
                effects.push(reactive);
            } else if let Some(derived) = reactive.source_id() {
                Self::propagate(derived, effects);
            }
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
