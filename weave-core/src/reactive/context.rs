//! Reactive Context
//!
//! The reactive context tracks which observer is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current observer as a dependent, and when a memo or
//! effect is created, we can register it as a child of the current observer.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing observer.
//! Running an observer pushes an entry and the returned guard pops it, so
//! the previous observer is restored on every exit path, unwinding
//! included. Nested runs (a memo read inside an effect, an effect created
//! inside a memo, a write issued from an effect) simply stack.
//!
//! Each entry carries its own `untracked` flag. [`untrack`] only flips the
//! flag of the top entry; an observer that starts running inside an
//! untracked block pushes a fresh, tracked entry of its own.

use std::cell::RefCell;

use crate::graph::NodeId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    /// The observer being executed.
    observer: NodeId,
    /// Reads made directly by this observer do not subscribe it.
    untracked: bool,
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext {
    observer: NodeId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given observer.
    ///
    /// The context is exited when the returned guard is dropped.
    pub(crate) fn enter(observer: NodeId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer,
                untracked: false,
            });
        });

        Self { observer }
    }

    /// Check if a read right now would create a subscription.
    pub(crate) fn is_tracking() -> bool {
        Self::tracking_observer().is_some()
    }

    /// The observer that owns nodes created right now, tracked or not.
    pub(crate) fn current_owner() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.observer))
    }

    /// The observer that a read right now should subscribe, if any.
    pub(crate) fn tracking_observer() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|entry| !entry.untracked)
                .map(|entry| entry.observer)
        })
    }

    /// Set the top entry's untracked flag, returning its previous value.
    ///
    /// Returns `None` when no observer is running.
    fn set_untracked(untracked: bool) -> Option<bool> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::replace(&mut entry.untracked, untracked))
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The stack can already be gone during thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.observer, self.observer,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer, entry.observer
                );
            }
        });
    }
}

/// Restores the untracked flag of the entry it modified.
struct UntrackGuard {
    previous: Option<bool>,
}

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous {
            ReactiveContext::set_untracked(previous);
        }
    }
}

/// Run `f` without subscribing the current observer to anything it reads.
///
/// Memos and effects created inside `f` are still owned by the current
/// observer, and their own runs track normally.
///
/// # Example
///
/// ```rust
/// use weave_core::{create_effect, create_signal, untrack};
///
/// let (a, set_a) = create_signal(1);
/// let (b, set_b) = create_signal(10);
///
/// create_effect(move || {
///     let _tracked = a.get();
///     let _peeked = untrack(|| b.get());
/// });
///
/// set_b.set(11); // does not re-run the effect
/// set_a.set(2); // re-runs the effect
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _guard = UntrackGuard {
        previous: ReactiveContext::set_untracked(true),
    };
    f()
}
