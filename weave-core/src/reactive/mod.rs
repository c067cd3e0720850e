//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of Weave's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are invalidated.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It is lazy: it runs on
//! first read and again only when read after one of its dependencies changed.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems,
//! such as updating the DOM or logging.
//!
//! ## Ownership
//!
//! Memos and effects created while another memo or effect runs are owned by
//! it. When the owner re-runs, everything it created last time is disposed
//! first, so nested subscriptions never outlive the run that made them.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod memo;
mod runtime;
mod signal;

pub use context::untrack;
pub use effect::{create_effect, Cleanup, Effect, IntoCleanup};
pub use memo::{create_memo, Memo, MemoState};
pub use runtime::Runtime;
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
