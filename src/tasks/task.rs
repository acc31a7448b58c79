//! # Task: one background computation and its delivery state machine.
//!
//! A [`Task`] lives on the delivery context (it is `!Send`). Its computation is
//! boxed into a [`Job`] and handed to an [`Executor`]; the job only owns `Send`
//! pieces:
//! - the body and its [`TaskContext`];
//! - the cancellation and interrupt tokens;
//! - the outcome sender and a completion guard that wakes the delivery loop.
//!
//! Outcomes travel back over per-task channels and are drained by the
//! [`DeliveryLoop`](crate::DeliveryLoop), which calls into the task to deliver
//! progress and the terminal callback.
//!
//! ```text
//! start()  ── Pending → Running ── pre-execute hook + listener
//!    │
//!    └─► executor ── body(ctx) ── progress ─┐
//!                                └─ outcome ─┴─► delivery loop ─► finish() ── Running → Finished
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::delivery::{CompletionGuard, DeliveryHandle, Pump, Pumped, TaskId};
use crate::dispatch::{Executor, Job};
use crate::error::TaskError;
use crate::tasks::builder::TaskBuilder;
use crate::tasks::context::TaskContext;
use crate::tasks::listener::{ListenerRef, ListenerSlot};
use crate::tasks::state::{TaskState, Terminal};
use crate::tasks::task_ref::{ErasedTask, TaskRef};

/// Boxed computation, consumed by `start`.
pub(crate) enum Body<P, R> {
    /// Polled on the worker runtime; an interrupt drops it.
    Async(Box<dyn FnOnce(TaskContext<P>) -> BoxFuture<'static, R> + Send>),
    /// Run on the blocking pool; an interrupt cannot stop it, so the job waits for it.
    Blocking(Box<dyn FnOnce(TaskContext<P>) -> R + Send>),
}

type Hook<P, R> = Box<dyn FnMut(&Task<P, R>)>;
type ProgressHook<P, R> = Box<dyn FnMut(&Task<P, R>, &P)>;

/// Task-local callbacks; they run before the listener's.
pub(crate) struct Hooks<P, R> {
    pub(crate) pre_execute: Option<Hook<P, R>>,
    pub(crate) post_execute: Option<Hook<P, R>>,
    pub(crate) progress: Option<ProgressHook<P, R>>,
    pub(crate) cancelled: Option<Hook<P, R>>,
}

impl<P, R> Default for Hooks<P, R> {
    fn default() -> Self {
        Self {
            pre_execute: None,
            post_execute: None,
            progress: None,
            cancelled: None,
        }
    }
}

enum Outcome<R> {
    Completed(R),
    Cancelled,
    Failed(String),
}

struct Channels<P, R> {
    progress: mpsc::UnboundedReceiver<P>,
    outcome: oneshot::Receiver<Outcome<R>>,
}

pub(crate) struct Inner<P, R> {
    id: TaskId,
    tag: Arc<str>,
    state: Cell<TaskState>,
    cancel: CancellationToken,
    interrupt: CancellationToken,
    result: RefCell<Option<Rc<R>>>,
    last_progress: RefCell<Option<Rc<P>>>,
    slot: ListenerSlot,
    failed: Cell<bool>,
    hooks: RefCell<Hooks<P, R>>,
    body: Cell<Option<Body<P, R>>>,
    channels: RefCell<Option<Channels<P, R>>>,
}

/// A background computation producing progress `P` and a result `R`.
///
/// Cloning a `Task` clones the handle, not the computation.
///
/// # Example
/// ```rust
/// use taskhold::{Task, TaskState};
///
/// let task: Task<(), u32> = Task::new("answer", |_ctx| async { 42 });
/// assert_eq!(task.state(), TaskState::Pending);
/// assert!(task.result().is_err());
/// ```
pub struct Task<P, R> {
    inner: Rc<Inner<P, R>>,
}

impl<P, R> Clone for Task<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P, R> Task<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Creates a task whose body is an async computation.
    pub fn new<F, Fut>(tag: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(TaskContext<P>) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        TaskBuilder::new(tag).build(body)
    }

    /// Creates a task whose body runs on the blocking thread pool.
    pub fn blocking<F>(tag: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(TaskContext<P>) -> R + Send + 'static,
    {
        TaskBuilder::new(tag).build_blocking(body)
    }

    /// Starts a builder for a task with hooks.
    pub fn builder(tag: impl Into<String>) -> TaskBuilder<P, R> {
        TaskBuilder::new(tag)
    }

    pub(crate) fn from_parts(tag: String, hooks: Hooks<P, R>, body: Body<P, R>) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: TaskId::next(),
                tag: Arc::from(tag),
                state: Cell::new(TaskState::Pending),
                cancel: CancellationToken::new(),
                interrupt: CancellationToken::new(),
                result: RefCell::new(None),
                last_progress: RefCell::new(None),
                slot: ListenerSlot::new(),
                failed: Cell::new(false),
                hooks: RefCell::new(hooks),
                body: Cell::new(Some(body)),
                channels: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn from_any(any: Rc<dyn Any>) -> Option<Self> {
        any.downcast::<Inner<P, R>>()
            .ok()
            .map(|inner| Self { inner })
    }

    /// Returns a type-erased handle to this task.
    pub fn to_ref(&self) -> TaskRef {
        TaskRef::from_erased(self.inner.clone())
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn state(&self) -> TaskState {
        self.inner.state.get()
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
        self.inner.cancel.is_cancelled()
    }

    /// `true` once the task finished and its terminal outcome reached a listener.
    ///
    /// Stays `false` for a computation that panicked or was abandoned.
    pub fn is_result_delivered(&self) -> bool {
        self.is_finished() && !self.is_failed() && !self.has_pending_delivery()
    }

    /// `true` when the computation panicked or was dropped without an outcome.
    pub fn is_failed(&self) -> bool {
        self.inner.failed.get()
    }

    pub fn has_pending_delivery(&self) -> bool {
        self.inner.slot.pending().is_some()
    }

    pub fn pending_delivery(&self) -> Option<Terminal> {
        self.inner.slot.pending()
    }

    /// Hands the computation to `executor` and moves the task to `Running`.
    ///
    /// The pre-execute hook and the listener's `on_pre_execute` run inside this
    /// call. If the executor rejects the job, the task finishes through the
    /// cancellation path and [`TaskError::Rejected`] is returned.
    pub fn start(&self, delivery: &DeliveryHandle, executor: &dyn Executor) -> Result<(), TaskError> {
        self.inner.clone().start(delivery, executor)
    }

    /// Requests cancellation.
    ///
    /// With `may_interrupt` the running computation is also dropped at its next
    /// suspension point. Returns `true` only when this call newly cancelled a
    /// task that had not finished.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        self.inner.cancel(may_interrupt)
    }

    /// Returns the computed value.
    ///
    /// Fails while the task is not finished, or when it was cancelled before a
    /// value was produced.
    pub fn result(&self) -> Result<Rc<R>, TaskError> {
        if !self.is_finished() {
            return Err(self.illegal("result is not available before the task finished"));
        }
        self.inner
            .result
            .borrow()
            .clone()
            .ok_or_else(|| self.illegal("task was cancelled before producing a result"))
    }

    /// Returns the most recently delivered progress value.
    pub fn last_progress(&self) -> Result<Option<Rc<P>>, TaskError> {
        if self.is_pending() {
            return Err(self.illegal("progress is not available before the task started"));
        }
        Ok(self.inner.last_progress.borrow().clone())
    }

    /// Replaces the listener, delivering a buffered outcome synchronously.
    pub fn set_listener(&self, listener: ListenerRef) {
        self.inner.slot.attach(&self.to_ref(), listener);
    }

    pub fn remove_listener(&self) -> Option<ListenerRef> {
        self.inner.slot.detach()
    }

    pub fn listener(&self) -> Option<ListenerRef> {
        self.inner.slot.current()
    }

    fn illegal(&self, reason: &'static str) -> TaskError {
        TaskError::IllegalState {
            tag: self.tag().to_string(),
            reason,
        }
    }
}

impl<P, R> fmt::Debug for Task<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("state", &self.inner.state.get())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}

impl<P, R> Inner<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn task(self: &Rc<Self>) -> Task<P, R> {
        Task {
            inner: self.clone(),
        }
    }

    fn cancel(&self, may_interrupt: bool) -> bool {
        let newly = !self.cancel.is_cancelled() && self.state.get() != TaskState::Finished;
        // Interrupt first: a body parked on `ctx.cancelled()` must not win the race.
        if may_interrupt {
            self.interrupt.cancel();
        }
        self.cancel.cancel();
        newly
    }

    fn pre_execute(self: &Rc<Self>) {
        let task = self.task();
        if let Some(hook) = self.hooks.borrow_mut().pre_execute.as_mut() {
            hook(&task);
        }
        self.slot.pre_execute(&task.to_ref());
    }

    fn deliver_progress(self: &Rc<Self>, value: P) {
        let value = Rc::new(value);
        *self.last_progress.borrow_mut() = Some(value.clone());
        let task = self.task();
        if let Some(hook) = self.hooks.borrow_mut().progress.as_mut() {
            hook(&task, &*value);
        }
        self.slot.progress(&task.to_ref(), &*value);
    }

    fn drain_progress(self: &Rc<Self>) {
        loop {
            let next = match self.channels.borrow_mut().as_mut() {
                Some(channels) => channels.progress.try_recv().ok(),
                None => None,
            };
            match next {
                Some(value) => self.deliver_progress(value),
                None => break,
            }
        }
    }

    /// Runs once per task: on the drained outcome, or synchronously on rejection.
    fn finish(self: &Rc<Self>) {
        self.state.set(TaskState::Finished);
        let task = self.task();
        let terminal = if self.cancel.is_cancelled() {
            if let Some(hook) = self.hooks.borrow_mut().cancelled.as_mut() {
                hook(&task);
            }
            Terminal::Cancelled
        } else {
            if let Some(hook) = self.hooks.borrow_mut().post_execute.as_mut() {
                hook(&task);
            }
            Terminal::Completed
        };
        debug!(task = %self.tag, id = %self.id, ?terminal, "task finished");
        self.slot.deliver(&task.to_ref(), terminal);
    }
}

impl<P, R> ErasedTask for Inner<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn state(&self) -> TaskState {
        self.state.get()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn is_failed(&self) -> bool {
        self.failed.get()
    }

    fn cancel(&self, may_interrupt: bool) -> bool {
        Inner::cancel(self, may_interrupt)
    }

    fn slot(&self) -> &ListenerSlot {
        &self.slot
    }

    fn result_any(&self) -> Option<Rc<dyn Any>> {
        self.result
            .borrow()
            .clone()
            .map(|value| value as Rc<dyn Any>)
    }

    fn progress_any(&self) -> Option<Rc<dyn Any>> {
        self.last_progress
            .borrow()
            .clone()
            .map(|value| value as Rc<dyn Any>)
    }

    fn start(
        self: Rc<Self>,
        delivery: &DeliveryHandle,
        executor: &dyn Executor,
    ) -> Result<(), TaskError> {
        let state = self.state.get();
        if state != TaskState::Pending {
            return Err(TaskError::InvalidState {
                tag: self.tag.to_string(),
                state,
                operation: "start",
            });
        }
        let Some(body) = self.body.take() else {
            return Err(TaskError::IllegalState {
                tag: self.tag.to_string(),
                reason: "task body was already consumed",
            });
        };

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let notifier = delivery.notifier(self.id);
        let ctx = TaskContext::new(
            self.tag.clone(),
            self.cancel.clone(),
            progress_tx,
            notifier.clone(),
        );
        let job = computation(body, ctx, self.interrupt.clone(), outcome_tx, notifier.into_guard());

        *self.channels.borrow_mut() = Some(Channels {
            progress: progress_rx,
            outcome: outcome_rx,
        });
        self.state.set(TaskState::Running);
        delivery.register(self.id, self.clone());
        debug!(task = %self.tag, id = %self.id, "task started");
        self.pre_execute();

        if let Err(source) = executor.execute(job) {
            delivery.unregister(self.id);
            self.channels.borrow_mut().take();
            self.cancel.cancel();
            self.finish();
            return Err(TaskError::Rejected {
                tag: self.tag.to_string(),
                source,
            });
        }
        Ok(())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl<P, R> Pump for Inner<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn pump(self: Rc<Self>) -> Pumped {
        self.drain_progress();
        let outcome = match self.channels.borrow_mut().as_mut() {
            Some(channels) => channels.outcome.try_recv(),
            None => return Pumped::Finished,
        };
        let outcome = match outcome {
            Err(TryRecvError::Empty) => return Pumped::Idle,
            Err(TryRecvError::Closed) => {
                Outcome::Failed("computation dropped before producing an outcome".to_string())
            }
            Ok(outcome) => outcome,
        };
        // Progress sent right before the outcome is still queued.
        self.drain_progress();
        self.channels.borrow_mut().take();

        match outcome {
            Outcome::Completed(value) => {
                *self.result.borrow_mut() = Some(Rc::new(value));
                self.finish();
                Pumped::Finished
            }
            Outcome::Cancelled => {
                self.finish();
                Pumped::Finished
            }
            Outcome::Failed(message) => {
                self.failed.set(true);
                self.state.set(TaskState::Finished);
                Pumped::Failed(TaskError::Computation {
                    tag: self.tag.to_string(),
                    message,
                })
            }
        }
    }
}

/// Builds the `Send` job that runs `body` on a worker.
fn computation<P, R>(
    body: Body<P, R>,
    ctx: TaskContext<P>,
    interrupt: CancellationToken,
    outcome: oneshot::Sender<Outcome<R>>,
    guard: CompletionGuard,
) -> Job
where
    P: Send + 'static,
    R: Send + 'static,
{
    async move {
        let _guard = guard;
        let result = if ctx.is_cancelled() {
            Outcome::Cancelled
        } else {
            match body {
                Body::Async(body) => {
                    let run = AssertUnwindSafe(async move { body(ctx).await }).catch_unwind();
                    tokio::select! {
                        biased;
                        _ = interrupt.cancelled() => Outcome::Cancelled,
                        res = run => match res {
                            Ok(value) => Outcome::Completed(value),
                            Err(payload) => Outcome::Failed(panic_message(payload.as_ref())),
                        },
                    }
                }
                // The job keeps its worker (and its place in a serial lane) until
                // the blocking call returns, interrupted or not.
                Body::Blocking(body) => match tokio::task::spawn_blocking(move || body(ctx)).await {
                    Ok(_) if interrupt.is_cancelled() => Outcome::Cancelled,
                    Ok(value) => Outcome::Completed(value),
                    Err(err) => match err.try_into_panic() {
                        Ok(payload) => Outcome::Failed(panic_message(payload.as_ref())),
                        Err(err) => Outcome::Failed(err.to_string()),
                    },
                },
            }
        };
        let _ = outcome.send(result);
    }
    .boxed()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "computation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::delivery::DeliveryLoop;
    use crate::dispatch::WorkerPool;
    use crate::error::ExecutorError;
    use crate::tasks::listener::{AdvancedListener, Listener};

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl Listener for Recorder {
        fn on_pre_execute(&self, task: &TaskRef) {
            self.calls.borrow_mut().push(format!("pre:{}", task.tag()));
        }
        fn on_post_execute(&self, task: &TaskRef) {
            self.calls.borrow_mut().push(format!("post:{}", task.tag()));
        }
        fn as_advanced(&self) -> Option<&dyn AdvancedListener> {
            Some(self)
        }
    }

    impl AdvancedListener for Recorder {
        fn on_progress(&self, _task: &TaskRef, progress: &dyn Any) {
            if let Some(v) = progress.downcast_ref::<u32>() {
                self.calls.borrow_mut().push(format!("progress:{v}"));
            }
        }
        fn on_cancelled(&self, task: &TaskRef) {
            self.calls.borrow_mut().push(format!("cancelled:{}", task.tag()));
        }
    }

    struct Refuse;

    impl Executor for Refuse {
        fn execute(&self, _job: Job) -> Result<(), ExecutorError> {
            Err(ExecutorError::Saturated { capacity: 0 })
        }
    }

    fn pool() -> WorkerPool {
        WorkerPool::current(&Config::default()).unwrap()
    }

    async fn settle(event_loop: &mut DeliveryLoop) {
        tokio::time::timeout(Duration::from_secs(5), event_loop.run_until_idle())
            .await
            .expect("delivery loop stalled")
            .expect("computation failed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completes_with_progress_in_order() {
        let mut event_loop = DeliveryLoop::new();
        let recorder = Rc::new(Recorder::default());
        let task: Task<u32, u32> = Task::new("sum", |ctx| async move {
            for step in 1..=3 {
                ctx.publish_progress(step);
            }
            6
        });
        task.set_listener(recorder.clone());
        task.start(&event_loop.handle(), &pool()).unwrap();
        assert!(task.is_running());

        settle(&mut event_loop).await;

        assert!(task.is_finished());
        assert!(task.is_result_delivered());
        assert_eq!(*task.result().unwrap(), 6);
        assert_eq!(*task.last_progress().unwrap().unwrap(), 3);
        assert_eq!(
            recorder.calls(),
            vec!["pre:sum", "progress:1", "progress:2", "progress:3", "post:sum"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_twice_is_invalid() {
        let mut event_loop = DeliveryLoop::new();
        let task: Task<(), ()> = Task::new("once", |_| async {});
        task.start(&event_loop.handle(), &pool()).unwrap();

        let err = task.start(&event_loop.handle(), &pool()).unwrap_err();
        assert_eq!(err.as_label(), "task_invalid_state");

        settle(&mut event_loop).await;
        let err = task.start(&event_loop.handle(), &pool()).unwrap_err();
        assert!(matches!(
            err,
            TaskError::InvalidState {
                state: TaskState::Finished,
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detached_outcome_is_buffered_until_attach() {
        let mut event_loop = DeliveryLoop::new();
        let task: Task<(), &'static str> = Task::new("late", |_| async { "done" });
        task.start(&event_loop.handle(), &pool()).unwrap();
        settle(&mut event_loop).await;

        assert_eq!(task.pending_delivery(), Some(Terminal::Completed));
        assert!(!task.is_result_delivered());

        let recorder = Rc::new(Recorder::default());
        task.set_listener(recorder.clone());
        assert_eq!(recorder.calls(), vec!["post:late"]);
        assert!(task.is_result_delivered());

        // A second listener gets nothing: delivery happens at most once.
        let second = Rc::new(Recorder::default());
        task.set_listener(second.clone());
        assert!(second.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_cancels_running_computation() {
        let mut event_loop = DeliveryLoop::new();
        let recorder = Rc::new(Recorder::default());
        let task: Task<(), ()> = Task::new("sleepy", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        task.set_listener(recorder.clone());
        task.start(&event_loop.handle(), &pool()).unwrap();

        assert!(task.cancel(true));
        assert!(!task.cancel(true));
        settle(&mut event_loop).await;

        assert!(task.is_finished());
        assert!(task.is_cancelled());
        assert!(task.result().is_err());
        assert_eq!(recorder.calls(), vec!["pre:sleepy", "cancelled:sleepy"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cooperative_cancel_keeps_value_and_calls_cancelled() {
        let mut event_loop = DeliveryLoop::new();
        let recorder = Rc::new(Recorder::default());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let task: Task<(), u8> = Task::new("coop", |ctx| async move {
            let _ = started_tx.send(());
            ctx.cancelled().await;
            7
        });
        task.set_listener(recorder.clone());
        task.start(&event_loop.handle(), &pool()).unwrap();
        started_rx.await.unwrap();
        assert!(task.cancel(false));
        settle(&mut event_loop).await;

        assert_eq!(*task.result().unwrap(), 7);
        assert_eq!(recorder.calls(), vec!["pre:coop", "cancelled:coop"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_wins_over_cooperative_wakeup() {
        for _ in 0..20 {
            let mut event_loop = DeliveryLoop::new();
            let (started_tx, started_rx) = tokio::sync::oneshot::channel();
            let task: Task<(), u8> = Task::new("parked", |ctx| async move {
                let _ = started_tx.send(());
                ctx.cancelled().await;
                1
            });
            task.start(&event_loop.handle(), &pool()).unwrap();
            started_rx.await.unwrap();

            assert!(task.cancel(true));
            settle(&mut event_loop).await;
            assert!(task.result().is_err());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn progress_after_cancel_is_dropped() {
        let mut event_loop = DeliveryLoop::new();
        let recorder = Rc::new(Recorder::default());
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        let task: Task<u32, ()> = Task::new("muted", |ctx| async move {
            ctx.publish_progress(1);
            let _ = go_rx.await;
            ctx.publish_progress(2);
        });
        task.set_listener(recorder.clone());
        task.start(&event_loop.handle(), &pool()).unwrap();

        // Wait until the first value is delivered.
        while task.last_progress().unwrap().is_none() {
            event_loop.dispatch_next().await.unwrap();
        }
        assert!(task.cancel(false));
        go_tx.send(()).unwrap();
        settle(&mut event_loop).await;

        assert_eq!(*task.last_progress().unwrap().unwrap(), 1);
        assert_eq!(
            recorder.calls(),
            vec!["pre:muted", "progress:1", "cancelled:muted"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupted_blocking_body_finishes_after_it_returns() {
        let mut event_loop = DeliveryLoop::new();
        let returned = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = returned.clone();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let task: Task<(), u8> = Task::blocking("stubborn", move |_ctx| {
            let _ = started_tx.send(());
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            5
        });
        task.start(&event_loop.handle(), &pool()).unwrap();
        started_rx.await.unwrap();

        assert!(task.cancel(true));
        settle(&mut event_loop).await;
        assert!(returned.load(std::sync::atomic::Ordering::SeqCst));
        assert!(task.is_cancelled());
        assert!(task.result().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_after_finish_reports_false() {
        let mut event_loop = DeliveryLoop::new();
        let task: Task<(), ()> = Task::new("quick", |_| async {});
        task.start(&event_loop.handle(), &pool()).unwrap();
        settle(&mut event_loop).await;
        assert!(!task.cancel(false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panic_surfaces_from_dispatch() {
        let mut event_loop = DeliveryLoop::new();
        let recorder = Rc::new(Recorder::default());
        let task: Task<(), ()> = Task::new("boom", |_| async { panic!("kaboom") });
        task.set_listener(recorder.clone());
        task.start(&event_loop.handle(), &pool()).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), event_loop.run_until_idle())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::Computation {
                tag: "boom".into(),
                message: "kaboom".into()
            }
        );
        assert!(task.is_finished());
        assert!(task.is_failed());
        assert!(!task.is_result_delivered());
        assert_eq!(recorder.calls(), vec!["pre:boom"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_body_runs_off_the_runtime() {
        let mut event_loop = DeliveryLoop::new();
        let task: Task<u32, String> = Task::blocking("block", |ctx| {
            ctx.publish_progress(50);
            std::thread::sleep(Duration::from_millis(10));
            ctx.tag().to_uppercase()
        });
        task.start(&event_loop.handle(), &pool()).unwrap();
        settle(&mut event_loop).await;
        assert_eq!(task.result().unwrap().as_str(), "BLOCK");
        assert_eq!(*task.last_progress().unwrap().unwrap(), 50);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejection_finishes_as_cancelled() {
        let event_loop = DeliveryLoop::new();
        let recorder = Rc::new(Recorder::default());
        let task: Task<(), ()> = Task::new("refused", |_| async {});
        task.set_listener(recorder.clone());

        let err = task.start(&event_loop.handle(), &Refuse).unwrap_err();
        assert_eq!(err.as_label(), "task_rejected");
        assert!(task.is_finished());
        assert!(task.is_cancelled());
        assert_eq!(event_loop.in_flight(), 0);
        assert_eq!(recorder.calls(), vec!["pre:refused", "cancelled:refused"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hooks_run_before_listener() {
        let mut event_loop = DeliveryLoop::new();
        let order = Rc::new(RefCell::new(Vec::<String>::new()));
        let (pre, post, progress) = (order.clone(), order.clone(), order.clone());
        let task: Task<u32, ()> = Task::builder("hooked")
            .on_pre_execute(move |_| pre.borrow_mut().push("hook:pre".into()))
            .on_progress(move |_, v| progress.borrow_mut().push(format!("hook:progress:{v}")))
            .on_post_execute(move |t| post.borrow_mut().push(format!("hook:post:{}", t.tag())))
            .build(|ctx| async move { ctx.publish_progress(1) });

        let seen = order.clone();
        task.set_listener(crate::tasks::listener::listener_fn(move |_| {
            seen.borrow_mut().push("listener:post".into())
        }));
        task.start(&event_loop.handle(), &pool()).unwrap();
        settle(&mut event_loop).await;

        assert_eq!(
            *order.borrow(),
            vec!["hook:pre", "hook:progress:1", "hook:post:hooked", "listener:post"]
        );
    }

    #[test]
    fn erased_ref_downcasts_to_typed_task() {
        let task: Task<u8, String> = Task::new("typed", |_| async { String::new() });
        let erased = task.to_ref();
        assert!(erased.downcast::<u8, String>().is_some());
        assert!(erased.downcast::<u8, u8>().is_none());
        assert_eq!(erased, TaskRef::from(&task));
        assert!(erased.last_progress::<u8>().is_err());
    }
}
