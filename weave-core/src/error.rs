//! Error types for the reactive runtime.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors reported by the fallible (`try_*`) reactive operations.
///
/// Panics raised by user closures are not converted into this type; they
/// unwind to whoever triggered the run.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The handle refers to a node that has been disposed, either because
    /// its owner re-ran or because it was disposed explicitly.
    #[error("reactive node {0:?} has been disposed")]
    Disposed(NodeId),

    /// A memo was read while its own computation was running.
    #[error("memo {0:?} depends on itself")]
    Cycle(NodeId),

    /// A source was asked to execute as an observer.
    #[error("node {0:?} is a source and has nothing to run")]
    NotObserver(NodeId),

    /// Writes nested inside effects went deeper than the configured limit.
    #[error("write cascade exceeded the maximum depth of {limit}")]
    CascadeDepthExceeded { limit: usize },

    /// A runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A graph snapshot could not be serialized.
    #[error("failed to serialize graph snapshot: {0}")]
    Snapshot(#[source] serde_json::Error),
}
