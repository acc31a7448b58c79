//! # Type-erased task handle.
//!
//! The registry, listeners and resolvers deal with tasks of many `P`/`R`
//! combinations, so they hold [`TaskRef`]: an `Rc` to the task's shared state
//! behind a private object-safe trait. Typed access goes through
//! [`TaskRef::result`], [`TaskRef::last_progress`] or [`TaskRef::downcast`].

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::delivery::{DeliveryHandle, TaskId};
use crate::dispatch::Executor;
use crate::error::TaskError;
use crate::tasks::listener::{ListenerRef, ListenerSlot};
use crate::tasks::state::{TaskState, Terminal};
use crate::tasks::task::Task;

/// Object-safe view over a task's shared state.
pub(crate) trait ErasedTask {
    fn id(&self) -> TaskId;
    fn tag(&self) -> &str;
    fn state(&self) -> TaskState;
    fn is_cancelled(&self) -> bool;
    fn is_failed(&self) -> bool;
    fn cancel(&self, may_interrupt: bool) -> bool;
    fn slot(&self) -> &ListenerSlot;
    fn result_any(&self) -> Option<Rc<dyn Any>>;
    fn progress_any(&self) -> Option<Rc<dyn Any>>;
    fn start(
        self: Rc<Self>,
        delivery: &DeliveryHandle,
        executor: &dyn Executor,
    ) -> Result<(), TaskError>;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Cheaply clonable handle to a task of any progress/result type.
///
/// Equality is object identity: two refs are equal when they point at the same
/// task, even if another task later reuses the tag.
#[derive(Clone)]
pub struct TaskRef(Rc<dyn ErasedTask>);

impl TaskRef {
    pub(crate) fn from_erased(inner: Rc<dyn ErasedTask>) -> Self {
        Self(inner)
    }

    /// Process-unique id of the task object.
    pub fn id(&self) -> TaskId {
        self.0.id()
    }

    /// Stable tag the task was created with.
    pub fn tag(&self) -> &str {
        self.0.tag()
    }

    pub fn state(&self) -> TaskState {
        self.0.state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TaskState::Pending
    }

    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// `true` once the task finished and its terminal outcome reached a listener.
    pub fn is_result_delivered(&self) -> bool {
        self.is_finished() && !self.is_failed() && !self.has_pending_delivery()
    }

    /// `true` when the computation panicked or was dropped without an outcome.
    pub fn is_failed(&self) -> bool {
        self.0.is_failed()
    }

    /// `true` when the task finished while detached and still owes its outcome.
    pub fn has_pending_delivery(&self) -> bool {
        self.0.slot().pending().is_some()
    }

    /// Which terminal callback is owed, if any.
    pub fn pending_delivery(&self) -> Option<Terminal> {
        self.0.slot().pending()
    }

    /// Requests cancellation. See [`Task::cancel`].
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        self.0.cancel(may_interrupt)
    }

    /// Replaces the listener, delivering a buffered outcome synchronously.
    pub fn set_listener(&self, listener: ListenerRef) {
        self.0.slot().attach(self, listener);
    }

    /// Clears the listener and returns the previous one.
    pub fn remove_listener(&self) -> Option<ListenerRef> {
        self.0.slot().detach()
    }

    pub fn listener(&self) -> Option<ListenerRef> {
        self.0.slot().current()
    }

    pub fn has_listener(&self) -> bool {
        self.listener().is_some()
    }

    /// Returns the computed value, if the task finished with one and `R` matches.
    pub fn result<R: 'static>(&self) -> Result<Rc<R>, TaskError> {
        if !self.is_finished() {
            return Err(self.illegal("result is not available before the task finished"));
        }
        let value = self
            .0
            .result_any()
            .ok_or_else(|| self.illegal("task was cancelled before producing a result"))?;
        value
            .downcast::<R>()
            .map_err(|_| self.illegal("result type does not match"))
    }

    /// Returns the most recent progress value, if any was delivered and `P` matches.
    pub fn last_progress<P: 'static>(&self) -> Result<Option<Rc<P>>, TaskError> {
        if self.is_pending() {
            return Err(self.illegal("progress is not available before the task started"));
        }
        match self.0.progress_any() {
            None => Ok(None),
            Some(value) => value
                .downcast::<P>()
                .map(Some)
                .map_err(|_| self.illegal("progress type does not match")),
        }
    }

    /// Recovers the typed task, or `None` when the types do not match.
    pub fn downcast<P, R>(&self) -> Option<Task<P, R>>
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        Task::from_any(self.0.clone().into_any())
    }

    /// `true` when both refs point at the same task object.
    pub fn ptr_eq(&self, other: &TaskRef) -> bool {
        self.id() == other.id()
    }

    pub(crate) fn start(
        &self,
        delivery: &DeliveryHandle,
        executor: &dyn Executor,
    ) -> Result<(), TaskError> {
        self.0.clone().start(delivery, executor)
    }

    fn illegal(&self, reason: &'static str) -> TaskError {
        TaskError::IllegalState {
            tag: self.tag().to_string(),
            reason,
        }
    }
}

impl PartialEq for TaskRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TaskRef {}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRef")
            .field("id", &self.id())
            .field("tag", &self.tag())
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .field("pending_delivery", &self.pending_delivery())
            .finish()
    }
}

impl<P, R> From<&Task<P, R>> for TaskRef
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn from(task: &Task<P, R>) -> Self {
        task.to_ref()
    }
}
