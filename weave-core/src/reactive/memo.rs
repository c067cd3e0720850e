//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when one of its
//! dependencies changed since it was last computed.
//!
//! # How Memos Work
//!
//! 1. Creating a memo does not run it.
//!
//! 2. On first access, the memo runs its computation and caches the result.
//!
//! 3. When accessed again, if nothing it read has changed, the cache is
//!    returned.
//!
//! 4. When a dependency changes, the memo is marked stale and its own
//!    dependents are invalidated in turn. Nothing is recomputed yet.
//!
//! 5. The next access recomputes.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay stale (no wasted work)

use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use super::context::untrack;
use super::runtime::{Runtime, ThreadBound};
use crate::error::ReactiveError;
use crate::graph::{ComputeFn, Node, NodeId};

/// Cache state of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is the result of the latest run.
    Fresh,

    /// The memo must recompute before its value can be read.
    Stale,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// A memo created while another memo or effect is running is owned by it
/// and disposed when that owner re-runs. Reading a disposed memo fails with
/// [`ReactiveError::Disposed`].
///
/// # Example
///
/// ```rust
/// use weave_core::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Memo::new(move || count.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
///
/// Like every handle, a memo stays on the thread that created it:
///
/// ```compile_fail
/// let doubled = weave_core::Memo::new(|| 2);
/// std::thread::spawn(move || doubled.get());
/// ```
pub struct Memo<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
    _thread: ThreadBound,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Memo<T> {}

impl<T> Memo<T>
where
    T: Clone + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let compute: ComputeFn = Rc::new(move || Box::new(compute()) as Box<dyn Any>);
        Self {
            id: Runtime::create_node(Node::derived(compute)),
            _marker: PhantomData,
            _thread: PhantomData,
        }
    }

    /// Get the memo's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the memo has been disposed or reads itself while
    /// computing. Panics raised by the computation propagate.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Get the current value, reporting disposal and cycles as errors.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        Runtime::track(self.id)?;

        if let Some(value) = Runtime::with_graph(|graph| graph.fresh_value(self.id))? {
            return Ok(value);
        }

        // A run that returns without error has settled and cached its value.
        Runtime::run_observer(self.id)?;
        Runtime::with_graph(|graph| graph.fresh_value(self.id))?
            .ok_or(ReactiveError::Disposed(self.id))
    }

    /// Get the current value without subscribing the current observer.
    ///
    /// A stale memo still recomputes, and its own reads are tracked.
    pub fn get_untracked(&self) -> T {
        untrack(|| self.get())
    }

    /// Get the current cache state, or `None` once disposed.
    pub fn state(&self) -> Option<MemoState> {
        Runtime::with_graph(|graph| graph.memo_state(self.id))
    }

    /// Check whether the memo's owner has disposed it.
    pub fn is_disposed(&self) -> bool {
        !Runtime::with_graph(|graph| graph.contains(self.id))
    }
}

impl<T> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("state", &Runtime::with_graph(|graph| graph.memo_state(self.id)))
            .finish()
    }
}

/// Create a lazily evaluated memo.
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Memo::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn memo_computes_on_first_access() {
        let (call_count, calls) = counter();

        let memo = Memo::new(move || {
            calls.set(calls.get() + 1);
            42
        });

        // Not computed yet
        assert_eq!(memo.state(), Some(MemoState::Stale));
        assert_eq!(call_count.get(), 0);

        // First access triggers computation
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.get(), 1);
        assert_eq!(memo.state(), Some(MemoState::Fresh));
    }

    #[test]
    fn memo_caches_value_when_fresh() {
        let (call_count, calls) = counter();

        let memo = Memo::new(move || {
            calls.set(calls.get() + 1);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.get(), 1);
    }

    #[test]
    fn memo_goes_stale_when_dependency_changes() {
        let (call_count, calls) = counter();
        let signal = Signal::new(1);

        let memo = Memo::new(move || {
            calls.set(calls.get() + 1);
            signal.get() + 1
        });

        assert_eq!(memo.get(), 2);
        signal.set(5);

        assert_eq!(memo.state(), Some(MemoState::Stale));
        assert_eq!(call_count.get(), 1);

        assert_eq!(memo.get(), 6);
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn memo_chain_invalidates_transitively() {
        let base = Signal::new(5);
        let doubled = Memo::new(move || base.get() * 2);
        let plus_ten = Memo::new(move || doubled.get() + 10);

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(doubled.state(), Some(MemoState::Stale));
        assert_eq!(plus_ten.state(), Some(MemoState::Stale));
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let slot: Rc<Cell<Option<Memo<i32>>>> = Rc::new(Cell::new(None));
        let inner = slot.clone();
        let memo = Memo::new(move || match inner.get() {
            Some(me) => me.try_get().map(|v| v + 1).unwrap_or(-1),
            None => 0,
        });
        slot.set(Some(memo));

        assert_eq!(memo.get(), -1);
    }

    #[test]
    fn memo_writing_its_input_recomputes_until_settled() {
        let (call_count, calls) = counter();
        let signal = Signal::new(0);

        let memo = Memo::new(move || {
            calls.set(calls.get() + 1);
            let value = signal.get();
            if value < 3 {
                signal.set(value + 1);
            }
            value
        });

        assert_eq!(memo.get(), 3);
        assert_eq!(call_count.get(), 4);
        assert_eq!(memo.state(), Some(MemoState::Fresh));
    }

    #[test]
    fn copies_share_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1;
        assert_eq!(memo1.id(), memo2.id());
        assert_eq!(memo2.state(), Some(MemoState::Fresh));
    }
}
