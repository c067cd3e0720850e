//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the graph and executes the write protocol.
//!
//! # How It Works
//!
//! 1. When a memo or effect reads a signal or memo, the runtime records the
//!    edge in the graph.
//!
//! 2. When a signal's value changes, the runtime:
//!    a. Walks the graph outward from the signal (see `graph::scheduler`)
//!    b. Marks reachable memos stale; they recompute on next access
//!    c. Collects reachable effects into a deduplicated run set
//!    d. Runs every collected effect once, in discovery order
//!
//! 3. The whole cascade finishes before `set` returns. A write issued from
//!    inside an effect runs its own cascade to completion first, then the
//!    outer cascade continues with its remaining effects. An observer that
//!    invalidates itself this way runs again right after its current run.
//!
//! # Threading
//!
//! Each thread has its own runtime. Handles are plain ids into that
//! thread's arena, so they are only meaningful on the thread that created
//! them; the handle types are `!Send` to keep them there.
//!
//! # Failure
//!
//! The graph is never borrowed while user code runs. If an effect panics,
//! the panic reaches the writer immediately and the remaining effects of
//! that cascade are parked in a pending set. They run at the start of the
//! next cascade on this thread, or on [`Runtime::flush_pending`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::marker::PhantomData;

use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use super::context::ReactiveContext;
use super::Cleanup;
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::graph::{scheduler, Graph, GraphSnapshot, Node, NodeId, RunTarget};

thread_local! {
    static RUNTIME: RuntimeState = RuntimeState::new();
}

/// Keeps a handle `!Send` and `!Sync`: its id only resolves in the runtime
/// of the thread that created it.
pub(crate) type ThreadBound = PhantomData<*const ()>;

struct RuntimeState {
    graph: RefCell<Graph>,
    config: RefCell<RuntimeConfig>,
    /// Effects whose cascade was aborted by a panic.
    pending: RefCell<IndexSet<NodeId>>,
    /// Number of writes currently propagating on this thread.
    depth: Cell<usize>,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            graph: RefCell::new(Graph::new()),
            config: RefCell::new(RuntimeConfig::default()),
            pending: RefCell::new(IndexSet::new()),
            depth: Cell::new(0),
        }
    }
}

/// The per-thread reactive runtime.
///
/// All state lives in thread-local storage; this type only namespaces the
/// operations on it.
pub struct Runtime;

impl Runtime {
    /// Replace this thread's runtime configuration.
    pub fn configure(config: RuntimeConfig) {
        RUNTIME.with(|rt| *rt.config.borrow_mut() = config);
    }

    /// This thread's runtime configuration.
    pub fn config() -> RuntimeConfig {
        RUNTIME.with(|rt| rt.config.borrow().clone())
    }

    /// Counters describing this thread's graph.
    pub fn snapshot() -> GraphSnapshot {
        RUNTIME.with(|rt| {
            let mut snapshot = rt.graph.borrow().snapshot();
            snapshot.pending = rt.pending.borrow().len();
            snapshot
        })
    }

    /// Check if we're inside a tracked observer run.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }

    /// Run effects left over from a cascade that panicked.
    pub fn flush_pending() -> Result<(), ReactiveError> {
        let leftovers = Self::take_pending();
        if leftovers.is_empty() {
            return Ok(());
        }
        Self::run_effects(leftovers)
    }

    // =========================================================================
    // GRAPH ACCESS
    // =========================================================================

    pub(crate) fn with_graph<R>(f: impl FnOnce(&Graph) -> R) -> R {
        RUNTIME.with(|rt| f(&rt.graph.borrow()))
    }

    pub(crate) fn with_graph_mut<R>(f: impl FnOnce(&mut Graph) -> R) -> R {
        RUNTIME.with(|rt| f(&mut rt.graph.borrow_mut()))
    }

    /// Insert a node owned by the currently running observer, if any.
    pub(crate) fn create_node(node: Node) -> NodeId {
        let owner = ReactiveContext::current_owner();
        Self::with_graph_mut(|graph| graph.insert(node, owner))
    }

    /// Subscribe the current observer to `source`.
    pub(crate) fn track(source: NodeId) -> Result<(), ReactiveError> {
        let observer = ReactiveContext::tracking_observer();
        Self::with_graph_mut(|graph| {
            if !graph.contains(source) {
                return Err(ReactiveError::Disposed(source));
            }
            if let Some(observer) = observer {
                graph.link(source, observer);
            }
            Ok(())
        })
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Execute an observer with itself installed as the current context.
    ///
    /// Its previous edges and children are dropped first, and for effects
    /// the pending cleanup runs before the body does. If the run writes a
    /// value the observer depends on, the run is repeated until it settles,
    /// at most `max_cascade_depth` extra times.
    pub(crate) fn run_observer(id: NodeId) -> Result<(), ReactiveError> {
        let limit = Self::config().max_cascade_depth;
        let mut reruns = 0;
        while Self::run_once(id)? {
            reruns += 1;
            if reruns > limit {
                warn!(?id, limit, "observer keeps invalidating itself");
                return Err(ReactiveError::CascadeDepthExceeded { limit });
            }
            debug!(?id, reruns, "re-running self-invalidated observer");
        }
        Ok(())
    }

    /// Run an observer once. Returns whether it asked to be run again.
    fn run_once(id: NodeId) -> Result<bool, ReactiveError> {
        {
            let mut cleanups = Vec::new();
            let target = Self::with_graph_mut(|graph| graph.begin_run(id, &mut cleanups))?;
            let _running = RunningGuard { id };
            run_cleanups(cleanups);

            let _ctx = ReactiveContext::enter(id);
            match target {
                RunTarget::Derived(compute) => {
                    let value = compute();
                    Self::with_graph_mut(|graph| graph.finish_derived(id, value));
                }
                RunTarget::Effect(run) => {
                    trace!(?id, "running effect");
                    let returned = {
                        let mut body = run.borrow_mut();
                        (*body)()
                    };
                    let orphaned =
                        Self::with_graph_mut(|graph| graph.finish_effect(id, returned));
                    if let Some(cleanup) = orphaned {
                        cleanup.run();
                    }
                }
            }
        }
        Ok(Self::with_graph_mut(|graph| graph.take_rerun(id)))
    }

    /// Dispose a node and everything it owns.
    pub(crate) fn dispose(id: NodeId) {
        let mut cleanups = Vec::new();
        Self::with_graph_mut(|graph| graph.dispose(id, &mut cleanups));
        run_cleanups(cleanups);
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Reserve one level of write nesting.
    ///
    /// Fails before anything is stored when the configured depth is
    /// exhausted.
    pub(crate) fn enter_write() -> Result<WriteScope, ReactiveError> {
        RUNTIME.with(|rt| {
            let limit = rt.config.borrow().max_cascade_depth;
            let depth = rt.depth.get();
            if depth >= limit {
                warn!(limit, "write cascade too deep");
                return Err(ReactiveError::CascadeDepthExceeded { limit });
            }
            rt.depth.set(depth + 1);
            Ok(WriteScope { _private: () })
        })
    }

    /// Propagate a change of `source` and run every affected effect.
    pub(crate) fn propagate(source: NodeId) -> Result<(), ReactiveError> {
        let mut run_set = Self::take_pending();
        let mut cleanups = Vec::new();
        Self::with_graph_mut(|graph| {
            scheduler::invalidate(graph, source, &mut run_set, &mut cleanups);
        });
        debug!(?source, scheduled = run_set.len(), "propagating write");

        run_cleanups(cleanups);
        Self::run_effects(run_set)?;
        debug!(?source, "write settled");
        Ok(())
    }

    fn run_effects(run_set: IndexSet<NodeId>) -> Result<(), ReactiveError> {
        let mut cascade = Cascade {
            queue: run_set.into_iter().collect(),
        };
        while let Some(id) = cascade.queue.pop_front() {
            let (live, running) =
                Self::with_graph(|graph| (graph.contains(id), graph.is_running(id)));
            if !live {
                // Disposed by an effect that ran earlier in this cascade.
                continue;
            }
            if running {
                // Resumed from an aborted cascade while it is already running.
                Self::with_graph_mut(|graph| graph.request_rerun(id));
                continue;
            }
            Self::run_observer(id)?;
        }
        Ok(())
    }

    fn take_pending() -> IndexSet<NodeId> {
        let leftovers = RUNTIME.with(|rt| std::mem::take(&mut *rt.pending.borrow_mut()));
        if !leftovers.is_empty() {
            warn!(count = leftovers.len(), "resuming effects from an aborted cascade");
        }
        leftovers
    }
}

/// One level of write nesting; released on drop.
pub(crate) struct WriteScope {
    _private: (),
}

impl Drop for WriteScope {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| rt.depth.set(rt.depth.get().saturating_sub(1)));
    }
}

/// Clears a node's running flag however its run ends.
struct RunningGuard {
    id: NodeId,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| {
            if let Ok(mut graph) = rt.graph.try_borrow_mut() {
                graph.set_running(self.id, false);
            }
        });
    }
}

/// The effects still to run in one cascade.
///
/// If an effect panics, whatever is left is parked in the runtime's pending
/// set instead of being lost.
struct Cascade {
    queue: VecDeque<NodeId>,
}

impl Drop for Cascade {
    fn drop(&mut self) {
        if !std::thread::panicking() || self.queue.is_empty() {
            return;
        }
        let queue = std::mem::take(&mut self.queue);
        let _ = RUNTIME.try_with(|rt| {
            if let Ok(mut pending) = rt.pending.try_borrow_mut() {
                pending.extend(queue);
            }
        });
    }
}

fn run_cleanups(cleanups: Vec<Cleanup>) {
    for cleanup in cleanups {
        cleanup.run();
    }
}
