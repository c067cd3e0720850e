//! Graph Nodes
//!
//! This module defines the node types that live in the reactive arena.
//!
//! A node's flavour is fixed when it is constructed: the [`Payload`] variant
//! is the discriminant, and [`Node::kind`] maps it to the public
//! [`NodeKind`] tag.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::reactive::{Cleanup, MemoState};

new_key_type! {
    /// Unique identifier for a node in the reactive arena.
    ///
    /// Ids are generational: once a node is disposed its id never refers to
    /// another node, so stale handles are detected instead of aliasing.
    pub struct NodeId;
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    /// A root cell (signal). Sources are only ever written from outside;
    /// they have dependents but never dependencies.
    Source,

    /// A memoized derived computation. It is both a source (other observers
    /// read it) and an observer (it reads other sources).
    Derived,

    /// An eager side-effecting observer. Effects have dependencies but no
    /// dependents.
    Effect,
}

/// Type-erased memo computation.
pub(crate) type ComputeFn = Rc<dyn Fn() -> Box<dyn Any>>;

/// Type-erased effect body. The optional return value is the cleanup to run
/// before the next execution.
pub(crate) type EffectFn = Rc<RefCell<dyn FnMut() -> Option<Cleanup>>>;

/// Cached value of a derived node.
pub(crate) enum Cached {
    /// The value produced by the most recent completed run.
    Fresh(Box<dyn Any>),
    /// Needs recomputation before the next read.
    Stale,
}

/// Flavour-specific data of a node.
pub(crate) enum Payload {
    Source {
        value: Box<dyn Any>,
    },
    Derived {
        compute: ComputeFn,
        cached: Cached,
    },
    Effect {
        run: EffectFn,
        cleanup: Option<Cleanup>,
        run_count: usize,
    },
}

/// What a node needs in order to execute, cloned out of the arena so the
/// graph is not borrowed while user code runs.
pub(crate) enum RunTarget {
    Derived(ComputeFn),
    Effect(EffectFn),
}

/// A node in the reactive arena.
pub(crate) struct Node {
    pub(crate) payload: Payload,

    /// The observer whose run created this node, if any.
    pub(crate) owner: Option<NodeId>,

    /// Observers created during this node's current run.
    pub(crate) children: SmallVec<[NodeId; 4]>,

    /// Set while the node's computation or body is executing.
    pub(crate) running: bool,

    /// Set when a write invalidated the node during its own run. The run
    /// that is in progress is repeated once it returns.
    pub(crate) rerun: bool,
}

impl Node {
    fn with_payload(payload: Payload) -> Self {
        Self {
            payload,
            owner: None,
            children: SmallVec::new(),
            running: false,
            rerun: false,
        }
    }

    /// Create a new source node holding `value`.
    pub(crate) fn source(value: Box<dyn Any>) -> Self {
        Self::with_payload(Payload::Source { value })
    }

    /// Create a new derived node. It starts stale so the first read computes.
    pub(crate) fn derived(compute: ComputeFn) -> Self {
        Self::with_payload(Payload::Derived {
            compute,
            cached: Cached::Stale,
        })
    }

    /// Create a new effect node that has not run yet.
    pub(crate) fn effect(run: EffectFn) -> Self {
        Self::with_payload(Payload::Effect {
            run,
            cleanup: None,
            run_count: 0,
        })
    }

    /// Get the node's kind.
    pub(crate) fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Source { .. } => NodeKind::Source,
            Payload::Derived { .. } => NodeKind::Derived,
            Payload::Effect { .. } => NodeKind::Effect,
        }
    }

    /// Whether this node can depend on other nodes.
    pub(crate) fn is_observer(&self) -> bool {
        match self.kind() {
            NodeKind::Source => false,
            NodeKind::Derived | NodeKind::Effect => true,
        }
    }

    /// Cache state for derived nodes, `None` for other kinds.
    pub(crate) fn memo_state(&self) -> Option<MemoState> {
        match &self.payload {
            Payload::Derived {
                cached: Cached::Fresh(_),
                ..
            } => Some(MemoState::Fresh),
            Payload::Derived {
                cached: Cached::Stale,
                ..
            } => Some(MemoState::Stale),
            Payload::Source { .. } | Payload::Effect { .. } => None,
        }
    }

    /// Drop a derived node's cached value. No-op for other kinds.
    pub(crate) fn mark_stale(&mut self) {
        if let Payload::Derived { cached, .. } = &mut self.payload {
            *cached = Cached::Stale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute() -> ComputeFn {
        Rc::new(|| Box::new(1_i32) as Box<dyn Any>)
    }

    #[test]
    fn kind_follows_payload() {
        assert_eq!(Node::source(Box::new(0_u8)).kind(), NodeKind::Source);
        assert_eq!(Node::derived(compute()).kind(), NodeKind::Derived);

        let run: EffectFn = Rc::new(RefCell::new(|| None));
        assert_eq!(Node::effect(run).kind(), NodeKind::Effect);
    }

    #[test]
    fn derived_node_starts_stale() {
        let node = Node::derived(compute());
        assert_eq!(node.memo_state(), Some(MemoState::Stale));
        assert!(node.is_observer());
    }

    #[test]
    fn mark_stale_drops_cached_value() {
        let mut node = Node::derived(compute());
        if let Payload::Derived { cached, .. } = &mut node.payload {
            *cached = Cached::Fresh(Box::new(2_i32));
        }
        assert_eq!(node.memo_state(), Some(MemoState::Fresh));

        node.mark_stale();
        assert_eq!(node.memo_state(), Some(MemoState::Stale));
    }

    #[test]
    fn sources_are_not_observers() {
        let mut node = Node::source(Box::new("a"));
        assert!(!node.is_observer());
        assert_eq!(node.memo_state(), None);

        // Only derived nodes carry a cache.
        node.mark_stale();
        assert_eq!(node.kind(), NodeKind::Source);
    }
}
