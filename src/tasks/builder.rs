//! # Fluent task construction.
//!
//! [`TaskBuilder`] collects task-local hooks and finishes with the computation:
//! - [`TaskBuilder::build`] for an async body polled on the worker runtime;
//! - [`TaskBuilder::build_blocking`] for a synchronous body run via `spawn_blocking`.
//!
//! Hooks run on the delivery context, before the listener's callback of the same kind.

use std::future::Future;

use futures::FutureExt;

use crate::tasks::context::TaskContext;
use crate::tasks::task::{Body, Hooks, Task};

/// Builder for [`Task`].
///
/// # Example
/// ```rust
/// use taskhold::Task;
///
/// let task: Task<u8, ()> = Task::builder("upload")
///     .on_progress(|task, pct| println!("{} at {pct}%", task.tag()))
///     .on_cancelled(|task| println!("{} cancelled", task.tag()))
///     .build(|ctx| async move { ctx.publish_progress(100) });
/// assert!(task.is_pending());
/// ```
pub struct TaskBuilder<P, R> {
    tag: String,
    hooks: Hooks<P, R>,
}

impl<P, R> TaskBuilder<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            hooks: Hooks::default(),
        }
    }

    /// Runs right after the task moved to `Running`.
    pub fn on_pre_execute(mut self, f: impl FnMut(&Task<P, R>) + 'static) -> Self {
        self.hooks.pre_execute = Some(Box::new(f));
        self
    }

    /// Runs when the task finished without being cancelled.
    pub fn on_post_execute(mut self, f: impl FnMut(&Task<P, R>) + 'static) -> Self {
        self.hooks.post_execute = Some(Box::new(f));
        self
    }

    /// Runs for every delivered progress value.
    pub fn on_progress(mut self, f: impl FnMut(&Task<P, R>, &P) + 'static) -> Self {
        self.hooks.progress = Some(Box::new(f));
        self
    }

    /// Runs when the task finished after being cancelled.
    pub fn on_cancelled(mut self, f: impl FnMut(&Task<P, R>) + 'static) -> Self {
        self.hooks.cancelled = Some(Box::new(f));
        self
    }

    /// Finishes with an async computation.
    pub fn build<F, Fut>(self, body: F) -> Task<P, R>
    where
        F: FnOnce(TaskContext<P>) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let body = Body::Async(Box::new(move |ctx| body(ctx).boxed()));
        Task::from_parts(self.tag, self.hooks, body)
    }

    /// Finishes with a synchronous computation run on the blocking pool.
    ///
    /// Interruption cannot stop a blocking call: the task still finishes as
    /// cancelled, but only once the body returns. The body should poll
    /// [`TaskContext::is_cancelled`] to exit early.
    pub fn build_blocking<F>(self, body: F) -> Task<P, R>
    where
        F: FnOnce(TaskContext<P>) -> R + Send + 'static,
    {
        Task::from_parts(self.tag, self.hooks, Body::Blocking(Box::new(body)))
    }
}
