//! # TaskManager: tag-keyed registry of submitted tasks.
//!
//! The manager owns every task that was submitted through it and has not yet
//! delivered its terminal outcome. It outlives the listeners bound to it, so an
//! owner can be torn down and recreated while its tasks keep running.
//!
//! ## Architecture
//! ```text
//! execute(task, listener?) ──► checks (state, tag, owner) ──► registry.insert(tag)
//!                                   │                               │
//!                                   │          ui_ready ? attach(shadow(listener)) : detach
//!                                   ▼                               │
//!                             TaskError                             ▼
//!                                                task.start(delivery, executor)
//!
//! terminal callback ──► shadow ──► registry.remove(tag) if same object ──► listener
//! ```
//!
//! ## Rules
//! - One registered task per tag until its outcome is delivered.
//! - A finished task whose outcome is still buffered may be replaced.
//! - Registry borrows never span a listener callback.
//! - Every manager operation runs on the delivery context; the type is `!Send`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::core::builder::TaskManagerBuilder;
use crate::core::resolver::{Resolver, ResolverRef};
use crate::core::shadow::ListenerShadow;
use crate::delivery::DeliveryHandle;
use crate::dispatch::{Executor, SerialExecutor};
use crate::error::{ExecutorError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{ListenerRef, TaskRef};

pub(crate) struct ManagerInner {
    tasks: RefCell<HashMap<String, TaskRef>>,
    ui_ready: Cell<bool>,
    owner: RefCell<Option<ResolverRef>>,
    delivery: DeliveryHandle,
    executor: Arc<dyn Executor>,
    serial: SerialExecutor,
    bus: Bus,
    strict: bool,
    shutdown: CancellationToken,
}

impl ManagerInner {
    pub(crate) fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    pub(crate) fn is_registered(&self, tag: &str) -> bool {
        self.tasks.borrow().contains_key(tag)
    }

    /// Removes `task`'s tag only while it still maps to this very task.
    pub(crate) fn remove_if_same(&self, task: &TaskRef) -> bool {
        let mut tasks = self.tasks.borrow_mut();
        match tasks.get(task.tag()) {
            Some(current) if current.ptr_eq(task) => {
                tasks.remove(task.tag());
                true
            }
            _ => false,
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Registry of background tasks for one owning scope.
///
/// Cheap to clone: clones share the registry.
///
/// # Example
/// ```rust
/// use taskhold::{Config, DeliveryLoop, Task, TaskManager, listener_fn};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut event_loop = DeliveryLoop::new();
///     let manager = TaskManager::builder(Config::default(), event_loop.handle()).build()?;
///
///     let task: Task<(), u32> = Task::new("answer", |_ctx| async { 42 });
///     manager.execute_with(&task, listener_fn(|t| println!("{} finished", t.tag())))?;
///     assert!(manager.is_active("answer"));
///
///     event_loop.run_until_idle().await?;
///     assert!(!manager.is_active("answer"));
///     assert_eq!(*task.result()?, 42);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TaskManager {
    inner: Rc<ManagerInner>,
}

impl TaskManager {
    /// Starts a builder bound to `delivery`.
    pub fn builder(cfg: Config, delivery: DeliveryHandle) -> TaskManagerBuilder {
        TaskManagerBuilder::new(cfg, delivery)
    }

    /// Creates a manager with default configuration on the current runtime.
    pub fn new(delivery: DeliveryHandle) -> Result<Self, ExecutorError> {
        Self::builder(Config::default(), delivery).build()
    }

    pub(crate) fn new_internal(
        cfg: &Config,
        delivery: DeliveryHandle,
        executor: Arc<dyn Executor>,
        serial: SerialExecutor,
        bus: Bus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                tasks: RefCell::new(HashMap::new()),
                ui_ready: Cell::new(cfg.ui_ready),
                owner: RefCell::new(None),
                delivery,
                executor,
                serial,
                bus,
                strict: cfg.strict,
                shutdown,
            }),
        }
    }

    // ---------------------------
    // Submission
    // ---------------------------

    /// Submits `task` with a listener resolved through the owner.
    pub fn execute(&self, task: impl Into<TaskRef>) -> Result<TaskRef, TaskError> {
        let executor = self.inner.executor.clone();
        self.execute_on(task, None, executor.as_ref())
    }

    /// Submits `task` with an explicit listener on the default pool.
    pub fn execute_with(
        &self,
        task: impl Into<TaskRef>,
        listener: ListenerRef,
    ) -> Result<TaskRef, TaskError> {
        let executor = self.inner.executor.clone();
        self.execute_on(task, Some(listener), executor.as_ref())
    }

    /// Submits `task` to the serial lane: it starts only after every earlier
    /// serial submission completed.
    pub fn execute_serial(
        &self,
        task: impl Into<TaskRef>,
        listener: Option<ListenerRef>,
    ) -> Result<TaskRef, TaskError> {
        let inner = self.inner.clone();
        self.execute_on(task, listener, &inner.serial)
    }

    /// Submits `task` on `executor`.
    ///
    /// # Errors
    /// - [`TaskError::InvalidState`] if the task is not pending;
    /// - [`TaskError::DuplicateTag`] if an unfinished task holds the tag;
    /// - [`TaskError::OwnershipExpired`] / [`TaskError::MissingListener`] if no
    ///   listener was given and the owner cannot provide one;
    /// - [`TaskError::Rejected`] if the executor refused the job.
    pub fn execute_on(
        &self,
        task: impl Into<TaskRef>,
        listener: Option<ListenerRef>,
        executor: &dyn Executor,
    ) -> Result<TaskRef, TaskError> {
        let task = task.into();
        if !task.is_pending() {
            return Err(TaskError::InvalidState {
                tag: task.tag().to_string(),
                state: task.state(),
                operation: "execute",
            });
        }
        if let Some(current) = self.get_task(task.tag()) {
            if !current.is_finished() {
                return Err(self.rejected(TaskError::DuplicateTag {
                    tag: task.tag().to_string(),
                }));
            }
        }
        let listener = match listener {
            Some(listener) => listener,
            None => self.resolve_owner(&task, false).map_err(|err| self.rejected(err))?,
        };

        self.inner
            .tasks
            .borrow_mut()
            .insert(task.tag().to_string(), task.clone());
        let detached = !self.inner.ui_ready.get();
        if detached {
            task.remove_listener();
        } else {
            task.set_listener(self.shadow(listener));
        }

        let mut event = Event::new(EventKind::TaskSubmitted).with_task(task.tag());
        if detached {
            event = event.with_reason("detached");
        }
        self.inner.publish(event);

        if let Err(err) = task.start(&self.inner.delivery, executor) {
            self.inner.remove_if_same(&task);
            return Err(self.rejected(err));
        }
        debug!(task = task.tag(), id = %task.id(), detached, "task submitted");
        Ok(task)
    }

    // ---------------------------
    // Binding
    // ---------------------------

    /// Binds `listener` to the registered task `tag`.
    ///
    /// A buffered outcome is delivered inside this call. Returns `None` when no
    /// task is registered under `tag`.
    pub fn attach(&self, tag: &str, listener: ListenerRef) -> Option<TaskRef> {
        let task = self.get_task(tag)?;
        self.bind(&task, listener);
        Some(task)
    }

    /// Binds the listener `resolver` provides for the registered task `tag`.
    pub fn attach_with(
        &self,
        tag: &str,
        resolver: &dyn Resolver,
    ) -> Result<Option<TaskRef>, TaskError> {
        let Some(task) = self.get_task(tag) else {
            return Ok(None);
        };
        let listener = resolver
            .resolve(&task, true)
            .ok_or_else(|| TaskError::MissingListener {
                tag: tag.to_string(),
            })?;
        self.bind(&task, listener);
        Ok(Some(task))
    }

    /// Binds `listener` to every registered task among `tags`.
    pub fn attach_all<I, S>(&self, listener: ListenerRef, tags: I) -> Vec<TaskRef>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .filter_map(|tag| self.attach(tag.as_ref(), listener.clone()))
            .collect()
    }

    /// Resolves listeners for every registered task among `tags`, then binds them.
    ///
    /// Nothing is bound if any resolution fails.
    pub fn attach_all_with<I, S>(
        &self,
        resolver: &dyn Resolver,
        tags: I,
    ) -> Result<Vec<TaskRef>, TaskError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tasks: Vec<TaskRef> = tags
            .into_iter()
            .filter_map(|tag| self.get_task(tag.as_ref()))
            .collect();
        self.bind_resolved(resolver, tasks)
    }

    /// Rebinds every registered task to the listener `resolver` provides.
    ///
    /// Runs in two passes: all listeners are resolved first (failing fast with
    /// [`TaskError::MissingListener`]), then each is attached, which may
    /// deliver buffered outcomes. Returns the number of rebound tasks.
    pub fn reattach_all(&self, resolver: &dyn Resolver) -> Result<usize, TaskError> {
        let bound = self.bind_resolved(resolver, self.snapshot())?;
        self.inner
            .publish(Event::new(EventKind::TasksReattached).with_count(bound.len()));
        Ok(bound.len())
    }

    /// Removes the listener from the registered task `tag`.
    pub fn detach(&self, tag: &str) -> Option<TaskRef> {
        let task = self.get_task(tag)?;
        task.remove_listener();
        Some(task)
    }

    /// Removes listeners from the registered tasks among `tags`.
    pub fn detach_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let count = tags
            .into_iter()
            .filter(|tag| self.detach(tag.as_ref()).is_some())
            .count();
        self.inner
            .publish(Event::new(EventKind::ListenersDetached).with_count(count));
        count
    }

    /// Removes listeners from every registered task.
    pub fn detach_all(&self) -> usize {
        let tasks = self.snapshot();
        for task in &tasks {
            task.remove_listener();
        }
        self.inner
            .publish(Event::new(EventKind::ListenersDetached).with_count(tasks.len()));
        tasks.len()
    }

    // ---------------------------
    // Cancellation
    // ---------------------------

    /// Unregisters the task `tag`, then requests cooperative cancellation.
    ///
    /// The tag is free for a new submission right away.
    pub fn cancel(&self, tag: &str) -> Option<TaskRef> {
        let task = self.inner.tasks.borrow_mut().remove(tag)?;
        task.cancel(false);
        self.inner
            .publish(Event::new(EventKind::TaskCancelRequested).with_task(tag));
        Some(task)
    }

    /// Interrupts every registered task; entries stay until their
    /// cancellation is delivered.
    pub fn cancel_all(&self) -> usize {
        let tasks = self.snapshot();
        for task in &tasks {
            task.cancel(true);
        }
        self.inner
            .publish(Event::new(EventKind::AllCancelRequested).with_count(tasks.len()));
        tasks.len()
    }

    // ---------------------------
    // Queries
    // ---------------------------

    /// `true` if a task is registered under `tag`, whatever its state.
    pub fn is_active(&self, tag: &str) -> bool {
        self.inner.is_registered(tag)
    }

    pub fn get_task(&self, tag: &str) -> Option<TaskRef> {
        self.inner.tasks.borrow().get(tag).cloned()
    }

    pub fn is_running(&self, tag: &str) -> bool {
        self.get_task(tag).is_some_and(|task| task.is_running())
    }

    pub fn is_result_delivered(&self, tag: &str) -> bool {
        self.get_task(tag)
            .is_some_and(|task| task.is_result_delivered())
    }

    /// Sorted tags of registered tasks.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.inner.tasks.borrow().keys().cloned().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.borrow().is_empty()
    }

    /// Fails with [`TaskError::ListenerAttached`] for the first registered task
    /// that still references a listener.
    pub fn assert_all_tasks_detached(&self) -> Result<(), TaskError> {
        match self.snapshot().into_iter().find(TaskRef::has_listener) {
            Some(task) => Err(TaskError::ListenerAttached {
                tag: task.tag().to_string(),
            }),
            None => Ok(()),
        }
    }

    // ---------------------------
    // Owner
    // ---------------------------

    pub fn set_ui_ready(&self, ready: bool) {
        self.inner.ui_ready.set(ready);
    }

    pub fn is_ui_ready(&self) -> bool {
        self.inner.ui_ready.get()
    }

    /// Installs the fallback resolver used by [`execute`](Self::execute).
    pub fn set_owner(&self, owner: ResolverRef) {
        *self.inner.owner.borrow_mut() = Some(owner);
    }

    /// Releases the owner and returns it.
    pub fn detach_owner(&self) -> Option<ResolverRef> {
        self.inner.owner.borrow_mut().take()
    }

    pub fn has_owner(&self) -> bool {
        self.inner.owner.borrow().is_some()
    }

    /// `true` when `owner` is the currently installed resolver.
    pub fn is_owned_by(&self, owner: &ResolverRef) -> bool {
        self.inner
            .owner
            .borrow()
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, owner))
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Receiver for manager events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    pub fn delivery(&self) -> &DeliveryHandle {
        &self.inner.delivery
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn snapshot(&self) -> Vec<TaskRef> {
        let mut tasks: Vec<TaskRef> = self.inner.tasks.borrow().values().cloned().collect();
        tasks.sort_by(|a, b| a.tag().cmp(b.tag()));
        tasks
    }

    fn shadow(&self, listener: ListenerRef) -> ListenerRef {
        Rc::new(ListenerShadow::new(Rc::downgrade(&self.inner), listener))
    }

    fn bind(&self, task: &TaskRef, listener: ListenerRef) {
        self.inner
            .publish(Event::new(EventKind::ListenerAttached).with_task(task.tag()));
        task.set_listener(self.shadow(listener));
    }

    fn bind_resolved(
        &self,
        resolver: &dyn Resolver,
        tasks: Vec<TaskRef>,
    ) -> Result<Vec<TaskRef>, TaskError> {
        let mut resolved = Vec::with_capacity(tasks.len());
        for task in tasks {
            let listener =
                resolver
                    .resolve(&task, true)
                    .ok_or_else(|| TaskError::MissingListener {
                        tag: task.tag().to_string(),
                    })?;
            resolved.push((task, listener));
        }
        Ok(resolved
            .into_iter()
            .map(|(task, listener)| {
                self.bind(&task, listener);
                task
            })
            .collect())
    }

    fn resolve_owner(&self, task: &TaskRef, is_reattach: bool) -> Result<ListenerRef, TaskError> {
        let owner = self
            .inner
            .owner
            .borrow()
            .clone()
            .ok_or_else(|| TaskError::OwnershipExpired {
                tag: task.tag().to_string(),
            })?;
        owner
            .resolve(task, is_reattach)
            .ok_or_else(|| TaskError::MissingListener {
                tag: task.tag().to_string(),
            })
    }

    fn rejected(&self, err: TaskError) -> TaskError {
        self.inner.publish(
            Event::new(EventKind::TaskRejected)
                .with_task(err.tag())
                .with_reason(err.as_label()),
        );
        err
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.tags())
            .field("ui_ready", &self.is_ui_ready())
            .field("has_owner", &self.has_owner())
            .field("strict", &self.inner.strict)
            .finish()
    }
}
