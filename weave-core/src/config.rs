//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::ReactiveError;

/// Default limit for writes nested inside effect runs.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 100;

/// Tunables for the reactive runtime of one thread.
///
/// Installed with [`Runtime::configure`](crate::reactive::Runtime::configure).
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many writes may be nested inside one another (an effect writing
    /// a signal whose cascade runs an effect that writes, and so on) before
    /// the innermost write fails with
    /// [`ReactiveError::CascadeDepthExceeded`]. Guards against effects that
    /// keep re-triggering each other.
    pub max_cascade_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ReactiveError> {
        Ok(serde_json::from_str(json)?)
    }
}
