//! Batched Notification
//!
//! Effects reached by a change are queued on a thread-local batch instead of
//! running inline. The queue is keyed by subscriber, so an effect reached by
//! several changes in one batch runs once, in first-reached order, after the
//! outermost batch closes. Writes outside any [`batch`] flush immediately.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use super::runtime::Reactive;
use super::subscriber::SubscriberId;

/// Flush passes allowed before pending work is dropped. Effects that keep
/// writing what they read would otherwise loop forever.
pub const MAX_FLUSH_PASSES: usize = 100;

thread_local! {
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PENDING: RefCell<IndexMap<SubscriberId, Arc<dyn Reactive>>> = RefCell::new(IndexMap::new());
}

/// Run `f` with notifications deferred until it returns.
///
/// Nested calls join the outer batch.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _guard = BatchGuard::enter();
    f()
}

/// Whether a batch is currently open on this thread.
pub fn is_batching() -> bool {
    BATCH_DEPTH.with(|d| d.get() > 0)
}

/// RAII guard for a batch; flushes when the outermost guard drops, including
/// during unwinding.
pub struct BatchGuard {
    flush_on_exit: bool,
}

impl BatchGuard {
    pub fn enter() -> Self {
        BATCH_DEPTH.with(|d| d.set(d.get() + 1));
        Self {
            flush_on_exit: true,
        }
    }

    fn hold() -> Self {
        BATCH_DEPTH.with(|d| d.set(d.get() + 1));
        Self {
            flush_on_exit: false,
        }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = BATCH_DEPTH.with(|d| {
            let depth = d.get().saturating_sub(1);
            d.set(depth);
            depth == 0
        });

        if outermost && self.flush_on_exit {
            flush();
        }
    }
}

pub(crate) fn enqueue(reactive: Arc<dyn Reactive>) {
    PENDING.with(|pending| {
        pending
            .borrow_mut()
            .entry(reactive.subscriber_id())
            .or_insert(reactive);
    });
}

pub(crate) fn flush_if_idle() {
    if !is_batching() {
        flush();
    }
}

fn take_pending() -> IndexMap<SubscriberId, Arc<dyn Reactive>> {
    PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()))
}

/// Run queued effects until nothing is pending.
fn flush() {
    // Writes made by effects queue up for the next pass instead of recursing.
    let _hold = BatchGuard::hold();

    for pass in 1..=MAX_FLUSH_PASSES {
        let pending = take_pending();
        if pending.is_empty() {
            return;
        }
        trace!(pass, effects = pending.len(), "flushing effects");
        for reactive in pending.into_values() {
            reactive.run();
        }
    }

    let dropped = take_pending();
    if !dropped.is_empty() {
        warn!(
            effects = dropped.len(),
            passes = MAX_FLUSH_PASSES,
            "effects still pending after flush limit; dropping them"
        );
        for reactive in dropped.into_values() {
            reactive.mark_clean();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_batches_share_depth() {
        assert!(!is_batching());
        batch(|| {
            assert!(is_batching());
            batch(|| assert!(is_batching()));
            assert!(is_batching());
        });
        assert!(!is_batching());
    }

    #[test]
    fn batch_returns_closure_value() {
        assert_eq!(batch(|| 7), 7);
    }
}
