//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a computed or effect), we
//! push the subscriber onto the stack. When the computation completes, we pop
//! it.
//!
//! This design supports nested reactive contexts (e.g., a computed that reads
//! from another computed). An [`untracked`] frame masks the frames below it,
//! so reads inside it register nothing.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::subscriber::{SourceId, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// What kind of evaluation pushed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// A computed value is evaluating. Writes to signals are forbidden.
    Computed,
    /// An effect is running.
    Effect,
    /// Reads are not tracked.
    Untracked,
}

#[derive(Debug, Clone)]
struct ContextEntry {
    subscriber_id: Option<SubscriberId>,
    kind: ContextKind,
    /// Sources read during this frame, in first-read order, without duplicates.
    dependencies: SmallVec<[SourceId; 8]>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new tracking context for the given subscriber.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber_id: SubscriberId, kind: ContextKind) -> Self {
        Self::push(Some(subscriber_id), kind)
    }

    /// Enter a frame in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(None, ContextKind::Untracked)
    }

    fn push(subscriber_id: Option<SubscriberId>, kind: ContextKind) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                kind,
                dependencies: SmallVec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the subscriber that reads should be attributed to, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Whether a computed evaluation is anywhere on the stack.
    pub fn is_computing() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| entry.kind == ContextKind::Computed)
        })
    }

    /// Record a dependency on the given source in the innermost tracked frame.
    ///
    /// Returns `true` the first time a source is recorded for that frame.
    pub fn track_dependency(source: SourceId) -> bool {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last_mut() {
                Some(entry) if entry.subscriber_id.is_some() => {
                    if entry.dependencies.contains(&source) {
                        false
                    } else {
                        entry.dependencies.push(source);
                        true
                    }
                }
                _ => false,
            }
        })
    }

    /// Get the dependencies collected in the current frame.
    pub fn get_dependencies() -> Vec<SourceId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.to_vec())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without registering any dependency on what it reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id, ContextKind::Effect);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_deduplicates_dependencies() {
        let id = SubscriberId::new();
        let _ctx = ReactiveContext::enter(id, ContextKind::Effect);
        let (a, b) = (SourceId::new(), SourceId::new());

        assert!(ReactiveContext::track_dependency(a));
        assert!(ReactiveContext::track_dependency(b));
        assert!(!ReactiveContext::track_dependency(a));

        assert_eq!(ReactiveContext::get_dependencies(), vec![a, b]);
    }

    #[test]
    fn untracked_frame_masks_outer_subscriber() {
        let id = SubscriberId::new();
        let _ctx = ReactiveContext::enter(id, ContextKind::Effect);

        untracked(|| {
            assert!(!ReactiveContext::is_active());
            assert!(!ReactiveContext::track_dependency(SourceId::new()));
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        assert!(ReactiveContext::get_dependencies().is_empty());
    }

    #[test]
    fn computing_flag_sees_through_nested_frames() {
        assert!(!ReactiveContext::is_computing());
        let _outer = ReactiveContext::enter(SubscriberId::new(), ContextKind::Computed);
        let _inner = ReactiveContext::enter_untracked();
        assert!(ReactiveContext::is_computing());
    }
}
