//! Dependency Graph
//!
//! This module implements the arena that holds every reactive node and the
//! subscription edges between them.
//!
//! # Overview
//!
//! - Nodes live in a [`SlotMap`] and are addressed by [`NodeId`]. No node
//!   holds a reference to another node; all relations are id-keyed.
//! - Subscriptions are stored twice: `dependents` maps a source to the
//!   observers that read it, `dependencies` maps an observer to the sources
//!   it read. Both sides are updated together, so
//!   `o ∈ dependents[s] ⇔ s ∈ dependencies[o]` always holds.
//! - Ownership is a tree: an observer's `children` are the observers created
//!   during its current run, each with exactly one `owner`.
//!
//! Edge sets are [`IndexSet`]s so that traversal follows subscription order,
//! which makes effect scheduling deterministic.

mod node;
pub(crate) mod scheduler;
mod snapshot;

pub use node::{NodeId, NodeKind};
pub use snapshot::GraphSnapshot;

pub(crate) use node::{Cached, ComputeFn, EffectFn, Node, Payload, RunTarget};

use std::any::Any;

use indexmap::IndexSet;
use slotmap::{SecondaryMap, SlotMap};
use tracing::trace;

use crate::error::ReactiveError;
use crate::reactive::{Cleanup, MemoState};

type EdgeMap = SecondaryMap<NodeId, IndexSet<NodeId>>;

/// The reactive arena plus its adjacency maps.
pub(crate) struct Graph {
    nodes: SlotMap<NodeId, Node>,

    /// Source → observers that read it during their last run.
    dependents: EdgeMap,

    /// Observer → sources it read during its last run.
    dependencies: EdgeMap,
}

impl Graph {
    /// Create an empty graph.
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            dependents: SecondaryMap::new(),
            dependencies: SecondaryMap::new(),
        }
    }

    /// Insert a node, registering it as a child of `owner` when given.
    pub(crate) fn insert(&mut self, mut node: Node, owner: Option<NodeId>) -> NodeId {
        let owner = owner.filter(|id| self.nodes.contains_key(*id));
        node.owner = owner;
        let id = self.nodes.insert(node);
        if let Some(parent) = owner.and_then(|parent| self.nodes.get_mut(parent)) {
            parent.children.push(id);
        }
        id
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id).map(Node::kind)
    }

    pub(crate) fn is_running(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.running)
    }

    pub(crate) fn set_running(&mut self, id: NodeId, running: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.running = running;
        }
    }

    /// Ask for a running observer to be run again when its current run ends.
    pub(crate) fn request_rerun(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.rerun = true;
        }
    }

    /// Clear the rerun request of `id`, returning whether one was made.
    pub(crate) fn take_rerun(&mut self, id: NodeId) -> bool {
        self.nodes
            .get_mut(id)
            .is_some_and(|node| std::mem::take(&mut node.rerun))
    }

    /// Observers currently subscribed to `source`, in subscription order.
    pub(crate) fn dependents_of(&self, source: NodeId) -> Vec<NodeId> {
        self.dependents
            .get(source)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Sources `observer` read during its last run, in read order.
    #[cfg(test)]
    pub(crate) fn dependencies_of(&self, observer: NodeId) -> Vec<NodeId> {
        self.dependencies
            .get(observer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Observers created during `owner`'s current run.
    #[cfg(test)]
    pub(crate) fn children_of(&self, owner: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(owner)
            .map(|node| node.children.to_vec())
            .unwrap_or_default()
    }

    // =========================================================================
    // LINKING
    // =========================================================================

    /// Record that `observer` read `source`.
    ///
    /// Idempotent: reading the same source twice in one run keeps a single
    /// edge. Returns `true` when a new edge was created.
    pub(crate) fn link(&mut self, source: NodeId, observer: NodeId) -> bool {
        let observes = self.nodes.get(observer).is_some_and(Node::is_observer);
        if !observes || source == observer || !self.nodes.contains_key(source) {
            return false;
        }

        let added = self
            .dependents
            .entry(source)
            .map(|entry| entry.or_insert_with(IndexSet::new).insert(observer))
            .unwrap_or(false);
        if let Some(entry) = self.dependencies.entry(observer) {
            entry.or_insert_with(IndexSet::new).insert(source);
        }

        if added {
            trace!(?source, ?observer, "linked");
        }
        added
    }

    /// Remove every subscription edge `observer` holds.
    ///
    /// The next run of the observer re-establishes whatever edges it still
    /// needs, so no diffing of old and new dependencies is required.
    pub(crate) fn unlink_dependencies(&mut self, observer: NodeId) {
        let Some(sources) = self.dependencies.remove(observer) else {
            return;
        };
        for source in &sources {
            if let Some(observers) = self.dependents.get_mut(*source) {
                observers.shift_remove(&observer);
            }
        }
        trace!(?observer, count = sources.len(), "unlinked");
    }

    /// Dispose every child of `owner`, leaves first.
    pub(crate) fn dispose_children(&mut self, owner: NodeId, cleanups: &mut Vec<Cleanup>) {
        let children = match self.nodes.get_mut(owner) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.dispose(child, cleanups);
        }
    }

    /// Remove a node from the arena.
    ///
    /// Children are disposed first, then every edge touching the node is
    /// dropped and its slot is freed. Pending effect cleanups are appended
    /// to `cleanups` in teardown order; the caller runs them once the graph
    /// is no longer borrowed.
    pub(crate) fn dispose(&mut self, id: NodeId, cleanups: &mut Vec<Cleanup>) {
        if !self.nodes.contains_key(id) {
            return;
        }

        self.dispose_children(id, cleanups);
        self.unlink_dependencies(id);

        if let Some(observers) = self.dependents.remove(id) {
            for observer in &observers {
                if let Some(sources) = self.dependencies.get_mut(*observer) {
                    sources.shift_remove(&id);
                }
            }
        }

        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(parent) = node.owner.and_then(|owner| self.nodes.get_mut(owner)) {
            parent.children.retain(|child| *child != id);
        }
        if let Payload::Effect {
            cleanup: Some(cleanup),
            ..
        } = node.payload
        {
            cleanups.push(cleanup);
        }
        trace!(?id, "disposed");
    }

    // =========================================================================
    // VALUES
    // =========================================================================

    /// Clone the value held by a source node.
    pub(crate) fn source_value<T: Clone + 'static>(&self, id: NodeId) -> Result<T, ReactiveError> {
        let node = self.nodes.get(id).ok_or(ReactiveError::Disposed(id))?;
        match &node.payload {
            Payload::Source { value } => Ok(downcast::<T>(value.as_ref()).clone()),
            Payload::Derived { .. } | Payload::Effect { .. } => Err(ReactiveError::Disposed(id)),
        }
    }

    /// Replace a source node's value.
    ///
    /// Returns `Ok(false)` without touching the node when the new value is
    /// equal to the stored one.
    pub(crate) fn write_source<T: PartialEq + 'static>(
        &mut self,
        id: NodeId,
        value: T,
    ) -> Result<bool, ReactiveError> {
        let node = self.nodes.get_mut(id).ok_or(ReactiveError::Disposed(id))?;
        let Payload::Source { value: slot } = &mut node.payload else {
            return Err(ReactiveError::Disposed(id));
        };
        let current = slot
            .downcast_mut::<T>()
            .expect("signal handle type matches stored value");
        if *current == value {
            return Ok(false);
        }
        *current = value;
        Ok(true)
    }

    /// Clone a derived node's cached value, or `None` when it is stale.
    pub(crate) fn fresh_value<T: Clone + 'static>(
        &self,
        id: NodeId,
    ) -> Result<Option<T>, ReactiveError> {
        let node = self.nodes.get(id).ok_or(ReactiveError::Disposed(id))?;
        match &node.payload {
            Payload::Derived {
                cached: Cached::Fresh(value),
                ..
            } => Ok(Some(downcast::<T>(value.as_ref()).clone())),
            Payload::Derived {
                cached: Cached::Stale,
                ..
            } => Ok(None),
            Payload::Source { .. } | Payload::Effect { .. } => Err(ReactiveError::Disposed(id)),
        }
    }

    pub(crate) fn memo_state(&self, id: NodeId) -> Option<MemoState> {
        self.nodes.get(id).and_then(Node::memo_state)
    }

    pub(crate) fn mark_stale(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.mark_stale();
        }
    }

    pub(crate) fn run_count(&self, id: NodeId) -> Option<usize> {
        match self.nodes.get(id).map(|node| &node.payload) {
            Some(Payload::Effect { run_count, .. }) => Some(*run_count),
            _ => None,
        }
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Prepare an observer for (re-)execution.
    ///
    /// Drops its current edges and children (supersession), hands back the
    /// effect's pending cleanup through `cleanups`, and marks the node as
    /// running. The returned target is called by the runtime with the graph
    /// released.
    pub(crate) fn begin_run(
        &mut self,
        id: NodeId,
        cleanups: &mut Vec<Cleanup>,
    ) -> Result<RunTarget, ReactiveError> {
        let node = self.nodes.get(id).ok_or(ReactiveError::Disposed(id))?;
        if node.running {
            return Err(ReactiveError::Cycle(id));
        }
        if !node.is_observer() {
            return Err(ReactiveError::NotObserver(id));
        }

        self.unlink_dependencies(id);
        self.dispose_children(id, cleanups);

        let node = self.nodes.get_mut(id).ok_or(ReactiveError::Disposed(id))?;
        node.running = true;
        node.rerun = false;
        match &mut node.payload {
            Payload::Derived { compute, .. } => Ok(RunTarget::Derived(compute.clone())),
            Payload::Effect { run, cleanup, .. } => {
                cleanups.extend(cleanup.take());
                Ok(RunTarget::Effect(run.clone()))
            }
            Payload::Source { .. } => Err(ReactiveError::NotObserver(id)),
        }
    }

    /// Store the result of a derived computation.
    pub(crate) fn finish_derived(&mut self, id: NodeId, value: Box<dyn Any>) {
        if let Some(Payload::Derived { cached, .. }) =
            self.nodes.get_mut(id).map(|node| &mut node.payload)
        {
            *cached = Cached::Fresh(value);
        }
    }

    /// Store the cleanup returned by an effect run.
    ///
    /// If the effect was disposed while it ran, the cleanup is handed back
    /// so the caller can run it immediately.
    pub(crate) fn finish_effect(
        &mut self,
        id: NodeId,
        returned: Option<Cleanup>,
    ) -> Option<Cleanup> {
        match self.nodes.get_mut(id).map(|node| &mut node.payload) {
            Some(Payload::Effect {
                cleanup, run_count, ..
            }) => {
                *cleanup = returned;
                *run_count += 1;
                None
            }
            _ => returned,
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    pub(crate) fn snapshot(&self) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::default();
        for node in self.nodes.values() {
            match node.kind() {
                NodeKind::Source => snapshot.sources += 1,
                NodeKind::Derived => {
                    snapshot.derived += 1;
                    if node.memo_state() == Some(MemoState::Stale) {
                        snapshot.stale += 1;
                    }
                }
                NodeKind::Effect => snapshot.effects += 1,
            }
        }
        snapshot.edges = self.dependents.values().map(IndexSet::len).sum();
        snapshot
    }

    /// Check that every edge is recorded on both sides.
    #[cfg(test)]
    pub(crate) fn edges_are_symmetric(&self) -> bool {
        let forward = self.dependents.iter().all(|(source, observers)| {
            observers.iter().all(|observer| {
                self.dependencies
                    .get(*observer)
                    .is_some_and(|sources| sources.contains(&source))
            })
        });
        let backward = self.dependencies.iter().all(|(observer, sources)| {
            sources.iter().all(|source| {
                self.dependents
                    .get(*source)
                    .is_some_and(|observers| observers.contains(&observer))
            })
        });
        forward && backward
    }
}

fn downcast<T: 'static>(value: &dyn Any) -> &T {
    value
        .downcast_ref::<T>()
        .expect("reactive handle type matches stored value")
}
