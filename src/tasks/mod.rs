//! # Tasks, their handles and their listeners.
//!
//! This module provides the task-related types:
//! - [`Task`] - typed state machine around one background computation
//! - [`TaskRef`] - type-erased handle used by registries, listeners and resolvers
//! - [`TaskContext`] - the worker-side view handed to the computation
//! - [`TaskBuilder`] - fluent construction with task-local hooks
//! - [`Listener`] / [`AdvancedListener`] - delivery targets (basic / advanced tier)
//!
//! ## State machine
//! ```text
//!            start()                 outcome dispatched
//! Pending ─────────────► Running ─────────────────────────► Finished
//!    │                     │                                   │
//!    └── cancel() ─────────┴── sets `cancelled` (orthogonal) ──┘
//!
//! finish():  cancelled ? on_cancelled hook ─► deliver(Cancelled)
//!                      : on_post_execute hook ─► deliver(Completed)
//! deliver(): listener attached ? call it : buffer as pending delivery
//! ```

mod builder;
mod context;
mod listener;
mod state;
mod task;
mod task_ref;

pub use builder::TaskBuilder;
pub use context::TaskContext;
pub use listener::{AdvancedListener, Listener, ListenerRef, listener_fn};
pub use state::{TaskState, Terminal};
pub use task::Task;
pub use task_ref::TaskRef;
