//! # Executor seam.
//!
//! An [`Executor`] accepts an opaque [`Job`] and runs it somewhere off the
//! delivery context. Jobs are built by [`Task::start`](crate::Task::start) and
//! already carry everything needed to report back; an executor only decides
//! *when* and *where* they run.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::ExecutorError;

/// Unit of work handed to an executor.
pub type Job = BoxFuture<'static, ()>;

/// Runs jobs off the delivery context.
///
/// Implementations must either accept the job (and eventually poll it to
/// completion) or return an error synchronously; a job is never dropped silently.
pub trait Executor: Send + Sync + 'static {
    /// Submits a job for execution.
    fn execute(&self, job: Job) -> Result<(), ExecutorError>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        (**self).execute(job)
    }
}
