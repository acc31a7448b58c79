//! Error types used by tasks, the task manager and the dispatch primitives.
//!
//! This module defines two error enums:
//!
//! - [`TaskError`]: contract violations and failures surfaced by [`Task`](crate::Task),
//!   [`TaskManager`](crate::TaskManager) and the [`DeliveryLoop`](crate::DeliveryLoop).
//! - [`ExecutorError`]: failures raised by an [`Executor`](crate::Executor) when a job
//!   cannot be accepted.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

use crate::tasks::TaskState;

/// # Errors produced by executors.
///
/// Raised synchronously from [`Executor::execute`](crate::Executor::execute); an executor
/// never drops a job silently.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The pool has no admission slot left (running + queued jobs reached capacity).
    #[error("worker pool saturated (capacity {capacity})")]
    Saturated {
        /// Total admission capacity of the pool (`workers + queue_capacity`).
        capacity: usize,
    },

    /// The executor no longer accepts jobs (its driver or runtime is gone).
    #[error("executor closed")]
    Closed,

    /// No tokio runtime was available to build the executor on.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskhold::ExecutorError;
    ///
    /// let err = ExecutorError::Saturated { capacity: 4 };
    /// assert_eq!(err.as_label(), "executor_saturated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::Saturated { .. } => "executor_saturated",
            ExecutorError::Closed => "executor_closed",
            ExecutorError::NoRuntime => "executor_no_runtime",
        }
    }
}

/// # Errors produced by tasks and the task manager.
///
/// State-machine contract violations (`InvalidState`, `IllegalState`, `DuplicateTag`,
/// `MissingListener`) indicate incorrect calling code and are never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Illegal state transition, e.g. starting a task twice.
    #[error("task '{tag}' cannot {operation}: task is {state}")]
    InvalidState {
        /// Tag of the task.
        tag: String,
        /// State the task was in.
        state: TaskState,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// A query that has no answer in the current state (result before finish, ...).
    #[error("task '{tag}': {reason}")]
    IllegalState {
        /// Tag of the task.
        tag: String,
        /// Why the value is unavailable.
        reason: &'static str,
    },

    /// A task with the same tag is registered and has not finished yet.
    #[error("task with tag '{tag}' is already registered and not finished")]
    DuplicateTag {
        /// The occupied tag.
        tag: String,
    },

    /// No owner resolver is available anymore (the owning scope is gone).
    #[error("cannot resolve a listener for '{tag}': the owner no longer owns this manager")]
    OwnershipExpired {
        /// Tag of the task that needed a listener.
        tag: String,
    },

    /// A resolver returned no listener for a task it was asked about.
    #[error("resolver returned no listener for task '{tag}'")]
    MissingListener {
        /// Tag of the task that could not be resolved.
        tag: String,
    },

    /// The executor refused the job.
    #[error("task '{tag}' rejected by executor: {source}")]
    Rejected {
        /// Tag of the rejected task.
        tag: String,
        /// The executor's reason.
        #[source]
        source: ExecutorError,
    },

    /// The background computation panicked or was dropped before producing an outcome.
    #[error("background computation of task '{tag}' failed: {message}")]
    Computation {
        /// Tag of the failing task.
        tag: String,
        /// Panic payload or abandonment reason.
        message: String,
    },

    /// A task still references a listener although every task was expected to be detached.
    #[error("task '{tag}' is not detached and still references a listener")]
    ListenerAttached {
        /// Tag of the offending task.
        tag: String,
    },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskhold::TaskError;
    ///
    /// let err = TaskError::DuplicateTag { tag: "sync".into() };
    /// assert_eq!(err.as_label(), "task_duplicate_tag");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::InvalidState { .. } => "task_invalid_state",
            TaskError::IllegalState { .. } => "task_illegal_state",
            TaskError::DuplicateTag { .. } => "task_duplicate_tag",
            TaskError::OwnershipExpired { .. } => "task_ownership_expired",
            TaskError::MissingListener { .. } => "task_missing_listener",
            TaskError::Rejected { .. } => "task_rejected",
            TaskError::Computation { .. } => "task_computation_failed",
            TaskError::ListenerAttached { .. } => "task_listener_attached",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::InvalidState {
                tag,
                state,
                operation,
            } => format!("invalid state: tag={tag} state={state} op={operation}"),
            TaskError::IllegalState { tag, reason } => format!("illegal state: tag={tag} {reason}"),
            TaskError::DuplicateTag { tag } => format!("duplicate tag: {tag}"),
            TaskError::OwnershipExpired { tag } => format!("ownership expired: tag={tag}"),
            TaskError::MissingListener { tag } => format!("missing listener: tag={tag}"),
            TaskError::Rejected { tag, source } => {
                format!("rejected: tag={tag} reason={}", source.as_label())
            }
            TaskError::Computation { tag, message } => {
                format!("computation failed: tag={tag} {message}")
            }
            TaskError::ListenerAttached { tag } => format!("listener attached: tag={tag}"),
        }
    }

    /// Returns the tag of the task this error refers to.
    pub fn tag(&self) -> &str {
        match self {
            TaskError::InvalidState { tag, .. }
            | TaskError::IllegalState { tag, .. }
            | TaskError::DuplicateTag { tag }
            | TaskError::OwnershipExpired { tag }
            | TaskError::MissingListener { tag }
            | TaskError::Rejected { tag, .. }
            | TaskError::Computation { tag, .. }
            | TaskError::ListenerAttached { tag } => tag,
        }
    }
}
