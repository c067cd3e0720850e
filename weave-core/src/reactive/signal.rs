//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, every memo downstream of it is marked
//!    stale and every effect downstream of it re-runs once.
//!
//! 3. Writing a value equal to the current one does nothing at all.
//!
//! # Memory Layout
//!
//! A `Signal<T>` is only an id into the thread's reactive arena, so it is
//! `Copy` and can be moved into as many closures as needed. Signals are
//! never disposed; they live as long as the thread's runtime, and their
//! handles cannot leave that thread.

use std::fmt::Debug;
use std::marker::PhantomData;

use super::runtime::{Runtime, ThreadBound};
use crate::error::ReactiveError;
use crate::graph::{Node, NodeId};

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. `PartialEq` decides
///   whether a write is a change.
///
/// # Example
///
/// ```rust
/// use weave_core::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
///
/// Handles belong to the thread that created them:
///
/// ```compile_fail
/// let count = weave_core::Signal::new(0);
/// std::thread::spawn(move || count.get());
/// ```
pub struct Signal<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
    _thread: ThreadBound,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    ///
    /// Signals are never owned by the observer that creates them.
    pub fn new(value: T) -> Self {
        let id = Runtime::with_graph_mut(|graph| graph.insert(Node::source(Box::new(value)), None));
        Self {
            id,
            _marker: PhantomData,
            _thread: PhantomData,
        }
    }

    /// Get the signal's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Get the current value, reporting an unknown handle as an error.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        Runtime::track(self.id)?;
        Runtime::with_graph(|graph| graph.source_value(self.id))
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        Runtime::with_graph(|graph| graph.source_value(self.id)).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Set a new value and notify subscribers.
    ///
    /// Every effect affected by the change has run by the time this
    /// returns.
    ///
    /// # Panics
    ///
    /// Panics if the write nests deeper than the configured cascade depth.
    /// Panics raised by effects re-run by this write propagate out of it.
    pub fn set(&self, value: T) {
        self.try_set(value).unwrap_or_else(|err| panic!("{err}"));
    }

    /// Set a new value, reporting runtime errors instead of panicking.
    ///
    /// Fails with [`ReactiveError::CascadeDepthExceeded`] before storing
    /// anything when this write is nested too deep inside other writes.
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        let _scope = Runtime::enter_write()?;
        let changed = Runtime::with_graph_mut(|graph| graph.write_source(self.id, value))?;
        if !changed {
            return Ok(());
        }
        Runtime::propagate(self.id)
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value. The
    /// read is not tracked.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.get_untracked());
        self.set(new_value);
    }

    /// Split into a read-only and a write-only handle.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (ReadSignal { inner: self }, WriteSignal { inner: self })
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = Runtime::with_graph(|graph| graph.source_value::<T>(self.id));
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &value.ok())
            .finish()
    }
}

/// The getter half of a signal.
pub struct ReadSignal<T> {
    inner: Signal<T>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// See [`Signal::get`].
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// See [`Signal::try_get`].
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        self.inner.try_get()
    }

    /// See [`Signal::get_untracked`].
    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }
}

/// The setter half of a signal.
pub struct WriteSignal<T> {
    inner: Signal<T>,
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T> WriteSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// See [`Signal::set`].
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    /// See [`Signal::try_set`].
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        self.inner.try_set(value)
    }

    /// See [`Signal::update`].
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.inner.update(f);
    }
}

/// Create a signal and return its getter and setter.
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: Clone + PartialEq + 'static,
{
    Signal::new(value).split()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
