//! # taskhold
//!
//! **Taskhold** runs background computations for owners that come and go.
//!
//! A task computes on a worker pool while its callbacks (start, progress,
//! completion, cancellation) are delivered on one interaction thread. Tasks are
//! registered by tag in a [`TaskManager`] that outlives its owner, so when the
//! owner is recreated it can find its tasks again, rebind fresh listeners and
//! receive outcomes produced while nobody was listening.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   owner (screen, session, ...)                         worker side
//!  ┌───────────────────────────┐                ┌─────────────────────────────┐
//!  │ LifecycleProxy / Resolver │                │ WorkerPool  (bounded)       │
//!  └────────────┬──────────────┘                │ SerialExecutor (FIFO lane)  │
//!               ▼                               └──────────────▲──────────────┘
//! ┌──────────────────────────────────────────┐                 │ Job
//! │ TaskManager                              │                 │
//! │  - registry: tag → TaskRef               │   start()  ┌────┴──────────────┐
//! │  - ui_ready, owner resolver              ├───────────►│ Task<P, R>        │
//! │  - Bus (events) ─► SubscriberSet         │            │  body(TaskContext)│
//! └──────────────────────────────────────────┘            └────┬──────────────┘
//!               ▲                                              │ progress / outcome
//!               │ shadow listener: remove tag, forward         ▼ (per-task channels)
//! ┌─────────────┴────────────────────────────────────────────────────────────┐
//! │ DeliveryLoop (interaction thread): drains channels, calls Task::finish   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of one task
//! ```text
//! Task::new ──► manager.execute*(task) ──► Pending → Running ──► on_pre_execute
//!                                                   │
//!            worker: ctx.publish_progress(p) ───────┼──► on_progress (advanced)
//!            worker: body returns / interrupted ────┘
//!                                                   ▼
//!                      delivery loop: Running → Finished
//!                        ├─ not cancelled ─► on_post_execute
//!                        └─ cancelled     ─► on_cancelled (advanced)
//!                      no listener attached ─► buffered until the next attach
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                              |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------------|
//! | **Tasks**         | Typed background computations with hooks and progress.       | [`Task`], [`TaskRef`], [`TaskContext`], [`TaskBuilder`] |
//! | **Listeners**     | Delivery targets in two capability tiers.                    | [`Listener`], [`AdvancedListener`], [`listener_fn`] |
//! | **Manager**       | Tag registry, duplicate checks, rebinding.                   | [`TaskManager`], [`Resolver`], [`LifecycleProxy`] |
//! | **Dispatch**      | Bounded pool and strictly ordered lane.                      | [`Executor`], [`WorkerPool`], [`SerialExecutor`] |
//! | **Delivery**      | Single-threaded callback context.                            | [`DeliveryLoop`], [`DeliveryHandle`]            |
//! | **Subscriber API**| Observe manager events.                                      | [`Subscribe`], [`SubscriberSet`], [`Event`]     |
//! | **Errors**        | Typed errors with stable labels.                             | [`TaskError`], [`ExecutorError`]                |
//! | **Configuration** | Pool sizing, bus capacity, initial owner state.              | [`Config`]                                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskhold::{Config, DeliveryLoop, Task, TaskManager, listener_fn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn taskhold::Subscribe>> = vec![Arc::new(taskhold::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn taskhold::Subscribe>> = Vec::new();
//!
//!     let mut event_loop = DeliveryLoop::new();
//!     let manager = TaskManager::builder(Config::default(), event_loop.handle())
//!         .with_subscribers(subs)
//!         .build()?;
//!
//!     let count: Task<u32, u32> = Task::new("count", |ctx| async move {
//!         for i in 1..=3 {
//!             ctx.publish_progress(i);
//!         }
//!         3
//!     });
//!     manager.execute_with(&count, listener_fn(|task| {
//!         println!("{} finished: {:?}", task.tag(), task.result::<u32>());
//!     }))?;
//!
//!     event_loop.run_until_idle().await?;
//!     assert!(manager.is_empty());
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod delivery;
mod dispatch;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{LifecycleProxy, Resolver, ResolverRef, TaskManager, TaskManagerBuilder};
pub use delivery::{DeliveryHandle, DeliveryLoop, TaskId};
pub use dispatch::{Executor, Job, SerialExecutor, WorkerPool};
pub use error::{ExecutorError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    AdvancedListener, Listener, ListenerRef, Task, TaskBuilder, TaskContext, TaskRef, TaskState,
    Terminal, listener_fn,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
