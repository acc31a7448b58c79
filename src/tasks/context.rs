//! # Worker-side task context.
//!
//! [`TaskContext`] is the only piece of a task a computation can see. It is
//! `Send`, and carries:
//! - the cooperative cancellation flag (a [`CancellationToken`]);
//! - the progress channel into the delivery context.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::delivery::Notifier;

/// Handle given to a running computation.
///
/// # Example
/// ```rust
/// use taskhold::{Task, TaskContext};
///
/// let task: Task<u32, u64> = Task::new("sum", |ctx: TaskContext<u32>| async move {
///     let mut total = 0u64;
///     for step in 0..10u32 {
///         if ctx.is_cancelled() {
///             break;
///         }
///         total += u64::from(step);
///         ctx.publish_progress(step * 10);
///     }
///     total
/// });
/// assert_eq!(task.tag(), "sum");
/// ```
pub struct TaskContext<P> {
    tag: Arc<str>,
    cancel: CancellationToken,
    progress: mpsc::UnboundedSender<P>,
    notifier: Notifier,
}

impl<P> TaskContext<P> {
    pub(crate) fn new(
        tag: Arc<str>,
        cancel: CancellationToken,
        progress: mpsc::UnboundedSender<P>,
        notifier: Notifier,
    ) -> Self {
        Self {
            tag,
            cancel,
            progress,
            notifier,
        }
    }

    /// Tag of the task this computation belongs to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns `true` once the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the task is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Returns a clone of the task's cancellation token (for nested work).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reports progress to the delivery context.
    ///
    /// No-op once the task is cancelled. Never blocks.
    pub fn publish_progress(&self, value: P) {
        if self.is_cancelled() {
            return;
        }
        if self.progress.send(value).is_ok() {
            self.notifier.notify();
        }
    }
}

impl<P> Clone for TaskContext<P> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<P> fmt::Debug for TaskContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("tag", &self.tag)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
