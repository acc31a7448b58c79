//! # Bounded worker pool.
//!
//! [`WorkerPool`] runs jobs on a tokio runtime while bounding two things:
//! - **concurrency**: at most [`Config::worker_count`] jobs are polled at once;
//! - **admission**: at most `workers + queue_capacity` jobs are running or waiting.
//!
//! ## Architecture
//! ```text
//! execute(job)
//!   ├─► admission.try_acquire_owned() ──► Err ─► ExecutorError::Saturated
//!   └─► handle.spawn(async {
//!           workers.acquire_owned().await   (queued here while the pool is busy)
//!           job.await
//!       })                                  (both permits released on exit)
//! ```
//!
//! ## Rules
//! - `execute` never blocks; backpressure is surfaced as an error.
//! - [`WorkerPool::run_queued`] waits for admission instead of failing (serial lane).

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::dispatch::executor::{Executor, Job};
use crate::error::ExecutorError;

/// Bounded-concurrency executor backed by a tokio runtime handle.
///
/// Cheap to clone: clones share the same permits.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    workers: Arc<Semaphore>,
    worker_count: usize,
    admission: Option<Arc<Semaphore>>,
    capacity: usize,
}

impl WorkerPool {
    /// Creates a pool that spawns onto `handle`.
    pub fn new(handle: Handle, cfg: &Config) -> Self {
        let worker_count = cfg.worker_count();
        let admission = cfg.admission_capacity();
        Self {
            handle,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            admission: admission.map(|n| Arc::new(Semaphore::new(n))),
            capacity: admission.unwrap_or(usize::MAX),
        }
    }

    /// Creates a pool on the runtime the caller is currently running in.
    pub fn current(cfg: &Config) -> Result<Self, ExecutorError> {
        let handle = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        Ok(Self::new(handle, cfg))
    }

    /// Maximum number of concurrently running jobs.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Admission capacity (`usize::MAX` when unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runtime handle jobs are spawned onto.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Admits `job`, waiting for an admission slot instead of failing,
    /// and returns the handle of the spawned job.
    pub(crate) async fn run_queued(&self, job: Job) -> Result<JoinHandle<()>, ExecutorError> {
        let admit = match &self.admission {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .map_err(|_closed| ExecutorError::Closed)?,
            ),
            None => None,
        };
        Ok(self.spawn(admit, job))
    }

    fn spawn(&self, admit: Option<OwnedSemaphorePermit>, job: Job) -> JoinHandle<()> {
        let workers = self.workers.clone();
        self.handle.spawn(async move {
            let _admit = admit;
            let _worker = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_closed) => return,
            };
            job.await;
        })
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        let admit = match &self.admission {
            Some(sem) => Some(sem.clone().try_acquire_owned().map_err(|_| {
                ExecutorError::Saturated {
                    capacity: self.capacity,
                }
            })?),
            None => None,
        };
        self.spawn(admit, job);
        Ok(())
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.worker_count)
            .field("capacity", &self.capacity)
            .field("available", &self.workers.available_permits())
            .finish()
    }
}
