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
//! 2. When any dependency changes, the effect re-runs before the write that
//!    changed it returns, once per write no matter how many paths lead to it.
//!
//! 3. Before re-running, the effect drops its old dependencies, disposes
//!    the memos and effects it created last time, and runs its cleanup. Its
//!    new run tracks fresh dependencies.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Effects can optionally return a [`Cleanup`]. It is called before the
//! effect re-runs and when the effect is disposed. This is useful for
//! cleaning up resources like event listeners or timers.

use std::cell::RefCell;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;

use super::runtime::{Runtime, ThreadBound};
use crate::error::ReactiveError;
use crate::graph::{EffectFn, Node, NodeId};

/// A callback run before an effect re-runs or is disposed.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    /// Wrap a cleanup callback.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(f))
    }

    pub(crate) fn run(self) {
        (self.0)();
    }
}

impl Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values an effect body may return.
///
/// `()` registers nothing; a [`Cleanup`] (or `Some(Cleanup)`) is kept until
/// the effect's next run or disposal.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The handle is `Copy`; dropping it does not stop the effect. A top-level
/// effect runs until [`Effect::dispose`] is called, a nested one until its
/// owner re-runs.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use weave_core::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let sink = seen.clone();
/// let _effect = Effect::new(move || sink.set(count.get()));
/// assert_eq!(seen.get(), 0);
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
/// ```
///
/// The handle cannot be sent to another thread:
///
/// ```compile_fail
/// let effect = weave_core::Effect::new(|| ());
/// std::thread::spawn(move || effect.dispose());
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    id: NodeId,
    _thread: ThreadBound,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    ///
    /// # Panics
    ///
    /// Panics raised by the first run propagate to the caller.
    pub fn new<F, R>(run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        Self::try_new(run).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Create a new effect, reporting runtime errors from its first run.
    pub fn try_new<F, R>(mut run: F) -> Result<Self, ReactiveError>
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        let body: EffectFn = Rc::new(RefCell::new(move || run().into_cleanup()));
        let id = Runtime::create_node(Node::effect(body));
        Runtime::run_observer(id)?;
        Ok(Self {
            id,
            _thread: PhantomData,
        })
    }

    /// Get the effect's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dispose of the effect.
    ///
    /// Its cleanup runs, the memos and effects it created are disposed, and
    /// it never runs again. Disposing twice is a no-op.
    pub fn dispose(&self) {
        Runtime::dispose(self.id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !Runtime::with_graph(|graph| graph.contains(self.id))
    }

    /// Get the number of times the effect has run, or 0 once disposed.
    pub fn run_count(&self) -> usize {
        Runtime::with_graph(|graph| graph.run_count(self.id)).unwrap_or(0)
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect and run it immediately.
pub fn create_effect<F, R>(run: F) -> Effect
where
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::cell::Cell;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let runs = run_count.clone();

        let effect = Effect::new(move || runs.set(runs.get() + 1));

        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let run_count = Rc::new(Cell::new(0));
        let runs = run_count.clone();

        let effect = Effect::new(move || {
            signal.get();
            runs.set(runs.get() + 1);
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(effect.run_count(), 0);

        signal.set(1);
        signal.set(2);
        assert_eq!(run_count.get(), 1);

        // Disposing twice is harmless.
        effect.dispose();
    }

    #[test]
    fn cleanup_runs_before_each_rerun() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();

        let _effect = Effect::new(move || {
            let value = signal.get();
            sink.borrow_mut().push(format!("run {value}"));
            let sink = sink.clone();
            Cleanup::new(move || sink.borrow_mut().push(format!("cleanup {value}")))
        });

        signal.set(1);
        signal.set(2);

        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1", "run 2"]
        );
    }

    #[test]
    fn optional_cleanup() {
        let signal = Signal::new(false);
        let cleaned = Rc::new(Cell::new(0));
        let count = cleaned.clone();

        let effect = Effect::new(move || {
            let count = count.clone();
            signal
                .get()
                .then(|| Cleanup::new(move || count.set(count.get() + 1)))
        });

        signal.set(true);
        assert_eq!(cleaned.get(), 0);

        effect.dispose();
        assert_eq!(cleaned.get(), 1);
    }

    #[test]
    fn effect_can_dispose_itself() {
        let signal = Signal::new(0);
        let slot: Rc<Cell<Option<Effect>>> = Rc::new(Cell::new(None));
        let cleanups = Rc::new(Cell::new(0));

        let me = slot.clone();
        let count = cleanups.clone();
        let effect = Effect::new(move || {
            if signal.get() > 0 {
                if let Some(me) = me.get() {
                    me.dispose();
                }
            }
            let count = count.clone();
            Cleanup::new(move || count.set(count.get() + 1))
        });
        slot.set(Some(effect));

        signal.set(1);

        assert!(effect.is_disposed());
        // One cleanup before the re-run, one for the cleanup returned by the
        // run that disposed the effect.
        assert_eq!(cleanups.get(), 2);

        signal.set(2);
        assert_eq!(cleanups.get(), 2);
    }

    #[test]
    fn effect_tracks_run_count() {
        let signal = Signal::new(0);
        let effect = Effect::new(move || {
            signal.get();
        });

        assert_eq!(effect.run_count(), 1);
        signal.set(1);
        assert_eq!(effect.run_count(), 2);
        signal.set(2);
        assert_eq!(effect.run_count(), 3);
    }
}
