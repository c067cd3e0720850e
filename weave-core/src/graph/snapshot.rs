//! Point-in-time counters describing the reactive graph.

use serde::Serialize;

use crate::error::ReactiveError;

/// Summary of the current thread's reactive graph.
///
/// Obtained from [`Runtime::snapshot`](crate::reactive::Runtime::snapshot).
/// The core never consumes it; it exists for debugging dumps and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    /// Live root cells.
    pub sources: usize,
    /// Live derived computations.
    pub derived: usize,
    /// Derived computations currently holding no cached value.
    pub stale: usize,
    /// Live effects.
    pub effects: usize,
    /// Subscription edges (each counted once).
    pub edges: usize,
    /// Effects left over from a cascade that panicked.
    pub pending: usize,
}

impl GraphSnapshot {
    /// Serialize the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ReactiveError> {
        serde_json::to_string_pretty(self).map_err(ReactiveError::Snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_all_counters() {
        let snapshot = GraphSnapshot {
            sources: 2,
            edges: 3,
            ..GraphSnapshot::default()
        };

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["sources"], 2);
        assert_eq!(json["edges"], 3);
        assert_eq!(json["pending"], 0);
    }
}
