//! Update Scheduler
//!
//! The scheduler walks the graph outward from a changed source and decides
//! what has to happen before the write returns.
//!
//! # Algorithm
//!
//! For every observer currently subscribed to the changed node, in
//! subscription order:
//!
//! 1. Drop the observer's dependency edges and dispose its children. Its
//!    next run re-subscribes to whatever it still reads.
//! 2. Derived nodes are marked stale and the walk recurses into their own
//!    dependents. Nothing is recomputed here; memos are pulled lazily.
//! 3. Effects are added to an insertion-ordered run set.
//!
//! An observer that is running when the write happens (it wrote a value it
//! depends on) keeps its edges and is flagged for a rerun instead. The
//! runtime repeats its run as soon as the current one returns.
//!
//! Because step 1 removes an observer from every source it was subscribed
//! to, an observer reachable along several paths (the diamond and flag
//! shapes) is visited once. The [`IndexSet`] keeps the run set deduplicated
//! even when leftovers from an earlier cascade are already queued.

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::{Graph, NodeId, NodeKind};
use crate::reactive::Cleanup;

/// Invalidate everything downstream of `source`.
///
/// Effects to run are appended to `run_set`; cleanups of disposed children
/// are appended to `cleanups`. The caller runs both after releasing the
/// graph.
pub(crate) fn invalidate(
    graph: &mut Graph,
    source: NodeId,
    run_set: &mut IndexSet<NodeId>,
    cleanups: &mut Vec<Cleanup>,
) {
    for observer in graph.dependents_of(source) {
        // Disposed by an earlier sibling's teardown.
        let Some(kind) = graph.kind(observer) else {
            continue;
        };

        if graph.is_running(observer) {
            // A write from inside the observer's own run. The runtime repeats
            // the run when it returns, which also replaces its edges.
            debug!(?observer, ?source, "running observer invalidated; rerun requested");
            graph.request_rerun(observer);
            if kind == NodeKind::Derived {
                invalidate(graph, observer, run_set, cleanups);
            }
            continue;
        }

        graph.unlink_dependencies(observer);
        graph.dispose_children(observer, cleanups);

        match kind {
            NodeKind::Derived => {
                trace!(?observer, "marked stale");
                graph.mark_stale(observer);
                invalidate(graph, observer, run_set, cleanups);
            }
            NodeKind::Effect => {
                run_set.insert(observer);
            }
            NodeKind::Source => {}
        }
    }
}
