//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for a [`TaskManager`](crate::TaskManager)
//! and the [`WorkerPool`](crate::WorkerPool) behind it.
//!
//! ## Sentinel values
//! - `workers = 0` → `available_parallelism + 1`
//! - `queue_capacity = 0` → unbounded admission (the pool never rejects)

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Global configuration for a task manager and its worker pool.
///
/// ## Field semantics
/// - `workers`: Jobs running at the same time (`0` = cores + 1)
/// - `queue_capacity`: Jobs admitted but waiting for a worker (`0` = unbounded)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `ui_ready`: Whether a new manager starts out able to deliver callbacks
/// - `strict`: Enables detach assertions when an owner is destroyed
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of computations running concurrently on the pool.
    pub workers: usize,

    /// Number of jobs the pool accepts beyond the running ones.
    ///
    /// When `workers + queue_capacity` jobs are admitted, further submissions fail
    /// with [`ExecutorError::Saturated`](crate::ExecutorError::Saturated).
    pub queue_capacity: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Initial value of the manager's `ui_ready` flag.
    pub ui_ready: bool,

    /// When set, [`LifecycleProxy::on_destroy`](crate::LifecycleProxy::on_destroy)
    /// verifies that no task still references a listener.
    pub strict: bool,
}

impl Config {
    /// Returns the number of pool workers, resolving the `0` sentinel.
    #[inline]
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                + 1
        } else {
            self.workers
        }
    }

    /// Returns the pool admission capacity as an `Option`.
    ///
    /// - `None` → unbounded (no admission semaphore)
    /// - `Some(n)` → at most `n` jobs running or queued
    #[inline]
    pub fn admission_capacity(&self) -> Option<usize> {
        if self.queue_capacity == 0 {
            None
        } else {
            Some(self.worker_count() + self.queue_capacity)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Builds a multi-thread tokio runtime sized to this pool.
    ///
    /// Worker threads are named `taskhold-worker-N`. Use it when the embedding
    /// application does not already run inside tokio.
    pub fn build_runtime(&self) -> io::Result<tokio::runtime::Runtime> {
        let counter = AtomicUsize::new(1);
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.worker_count())
            .thread_name_fn(move || {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                format!("taskhold-worker-{n}")
            })
            .enable_all()
            .build()
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `workers = 0` (cores + 1)
    /// - `queue_capacity = 128`
    /// - `bus_capacity = 1024`
    /// - `ui_ready = true`
    /// - `strict = false`
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 128,
            bus_capacity: 1024,
            ui_ready: true,
            strict: false,
        }
    }
}
