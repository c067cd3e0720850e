//! Weave Core
//!
//! This crate provides the reactive dataflow core for the Weave UI toolkit.
//! It tracks which computations read which pieces of state and, when state
//! changes, re-runs exactly the computations affected.
//!
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Glitch-free, deduplicated propagation of writes
//! - Lazy recomputation of derived values
//! - Ownership-based disposal of nested computations
//!
//! Rendering layers consume the core through four entry points:
//! [`create_signal`], [`create_memo`], [`create_effect`] and [`untrack`].
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, the tracking context, and the runtime
//! - `graph`: The node arena, subscription edges, and invalidation
//!
//! # Example
//!
//! ```rust
//! use weave_core::{create_effect, create_memo, create_signal};
//!
//! // Create a signal
//! let (count, set_count) = create_signal(0);
//!
//! // Create a derived value
//! let doubled = create_memo(move || count.get() * 2);
//!
//! // Create an effect
//! create_effect(move || {
//!     println!("Count: {}, Doubled: {}", count.get(), doubled.get());
//! });
//!
//! // Update the signal
//! set_count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! ```

pub mod graph;
pub mod reactive;

mod config;
mod error;

pub use config::{RuntimeConfig, DEFAULT_MAX_CASCADE_DEPTH};
pub use error::ReactiveError;
pub use graph::{GraphSnapshot, NodeId, NodeKind};
pub use reactive::{
    create_effect, create_memo, create_signal, untrack, Cleanup, Effect, IntoCleanup, Memo,
    MemoState, ReadSignal, Runtime, Signal, WriteSignal,
};
