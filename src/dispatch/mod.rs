//! Dispatch primitives: where background computations actually run.
//!
//! ## Contents
//! - [`Executor`] the seam between a task and the threads that run it
//! - [`WorkerPool`] bounded-concurrency pool on a tokio runtime
//! - [`SerialExecutor`] strictly ordered lane that funnels jobs through a pool
//!
//! ```text
//! Task::start ──► Executor::execute(job)
//!                    ├─ WorkerPool:     admission permit ─► spawn ─► worker permit ─► job
//!                    └─ SerialExecutor: FIFO ─► driver ─► WorkerPool (one job at a time)
//! ```

mod executor;
mod pool;
mod serial;

pub use executor::{Executor, Job};
pub use pool::WorkerPool;
pub use serial::SerialExecutor;
