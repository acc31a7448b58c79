//! End-to-end behaviour of the manager, the delivery loop and the dispatch primitives.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskhold::{
    AdvancedListener, Config, DeliveryLoop, ExecutorError, Listener, ListenerRef, Task,
    TaskError, TaskManager, TaskRef, Terminal, WorkerPool, listener_fn,
};

#[derive(Default)]
struct Journal {
    entries: RefCell<Vec<String>>,
}

impl Journal {
    fn push(&self, entry: String) {
        self.entries.borrow_mut().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }
}

/// Advanced listener writing every callback into a shared journal.
struct Screen {
    name: &'static str,
    journal: Rc<Journal>,
}

impl Screen {
    fn new(name: &'static str, journal: Rc<Journal>) -> Rc<Self> {
        Rc::new(Self { name, journal })
    }
}

impl Listener for Screen {
    fn on_pre_execute(&self, task: &TaskRef) {
        self.journal.push(format!("{}:pre:{}", self.name, task.tag()));
    }

    fn on_post_execute(&self, task: &TaskRef) {
        self.journal.push(format!("{}:post:{}", self.name, task.tag()));
    }

    fn as_advanced(&self) -> Option<&dyn AdvancedListener> {
        Some(self)
    }
}

impl AdvancedListener for Screen {
    fn on_progress(&self, task: &TaskRef, progress: &dyn Any) {
        if let Some(value) = progress.downcast_ref::<u32>() {
            self.journal
                .push(format!("{}:progress:{}:{value}", self.name, task.tag()));
        }
    }

    fn on_cancelled(&self, task: &TaskRef) {
        self.journal
            .push(format!("{}:cancelled:{}", self.name, task.tag()));
    }
}

fn counting_listener() -> (ListenerRef, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    let sink = count.clone();
    (listener_fn(move |_| sink.set(sink.get() + 1)), count)
}

fn parked(tag: &str) -> Task<(), ()> {
    Task::new(tag, |ctx| async move { ctx.cancelled().await })
}

async fn settle(event_loop: &mut DeliveryLoop) -> Result<(), TaskError> {
    tokio::time::timeout(Duration::from_secs(10), event_loop.run_until_idle())
        .await
        .expect("delivery loop stalled")
}

#[tokio::test(flavor = "multi_thread")]
async fn detached_submission_is_delivered_once_on_reattach() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    manager.set_ui_ready(false);

    let (listener, count) = counting_listener();
    manager.set_owner(Rc::new({
        let listener = listener.clone();
        move |_: &TaskRef, _: bool| Some(listener.clone())
    }));

    let t1: Task<(), u64> = Task::new("t1", |_| async { 7 });
    manager.execute(&t1)?;
    settle(&mut event_loop).await?;

    assert_eq!(count.get(), 0);
    assert_eq!(t1.pending_delivery(), Some(Terminal::Completed));
    assert!(manager.is_active("t1"));

    let resolver = move |task: &TaskRef, _: bool| (task.tag() == "t1").then(|| listener.clone());
    manager.set_ui_ready(true);
    assert_eq!(manager.reattach_all(&resolver)?, 1);

    assert_eq!(count.get(), 1);
    assert!(!t1.has_pending_delivery());
    assert!(!manager.is_active("t1"));
    assert_eq!(*t1.result()?, 7);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serial_lane_runs_b_after_a_returns() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let trace = Arc::new(Mutex::new(Vec::new()));

    for (tag, pause) in [("a", 60), ("b", 0)] {
        let trace = trace.clone();
        let task: Task<(), ()> = Task::new(tag, move |ctx| async move {
            trace.lock().unwrap().push(format!("{}:start", ctx.tag()));
            tokio::time::sleep(Duration::from_millis(pause)).await;
            trace.lock().unwrap().push(format!("{}:end", ctx.tag()));
        });
        manager.execute_serial(&task, Some(listener_fn(|_| {})))?;
    }
    settle(&mut event_loop).await?;

    assert_eq!(
        *trace.lock().unwrap(),
        vec!["a:start", "a:end", "b:start", "b:end"]
    );
    assert!(manager.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn serial_lane_waits_for_interrupted_blocking_task() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let trace = Arc::new(Mutex::new(Vec::new()));
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();

    let first = trace.clone();
    let a: Task<(), ()> = Task::blocking("a", move |_ctx| {
        first.lock().unwrap().push("a:start".to_string());
        let _ = started_tx.send(());
        std::thread::sleep(Duration::from_millis(300));
        first.lock().unwrap().push("a:end".to_string());
    });
    let second = trace.clone();
    let b: Task<(), ()> = Task::blocking("b", move |_ctx| {
        second.lock().unwrap().push("b:start".to_string());
        second.lock().unwrap().push("b:end".to_string());
    });
    manager.execute_serial(&a, Some(listener_fn(|_| {})))?;
    manager.execute_serial(&b, Some(listener_fn(|_| {})))?;

    started_rx.await?;
    assert!(manager.get_task("a").expect("a is registered").cancel(true));
    settle(&mut event_loop).await?;

    assert_eq!(
        *trace.lock().unwrap(),
        vec!["a:start", "a:end", "b:start", "b:end"]
    );
    assert!(a.is_cancelled());
    assert!(matches!(a.result(), Err(TaskError::IllegalState { .. })));
    assert!(b.result().is_ok());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_with_basic_listener_is_silent() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let (listener, count) = counting_listener();

    manager.execute_with(&parked("quiet"), listener)?;
    let cancelled = manager.cancel("quiet").expect("task was registered");
    assert!(!manager.is_active("quiet"));

    settle(&mut event_loop).await?;
    assert_eq!(count.get(), 0);
    assert!(cancelled.is_finished());
    assert!(cancelled.is_cancelled());
    assert!(!manager.is_active("quiet"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_delivery_happens_once_across_rebinding() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let journal = Rc::new(Journal::default());
    manager.set_ui_ready(false);

    let task: Task<(), ()> = Task::new("once", |_| async {});
    manager.execute_with(&task, Screen::new("first", journal.clone()))?;
    settle(&mut event_loop).await?;
    assert!(journal.entries().is_empty());

    manager.set_ui_ready(true);
    manager.attach("once", Screen::new("second", journal.clone()));
    task.remove_listener();
    task.set_listener(Screen::new("third", journal.clone()));
    task.remove_listener();
    task.set_listener(Screen::new("fourth", journal.clone()));

    assert_eq!(journal.entries(), vec!["second:post:once"]);
    assert!(task.is_result_delivered());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_is_reusable_after_delivery() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let (listener, count) = counting_listener();

    let first: Task<(), ()> = Task::new("sync", |_| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
    });
    manager.execute_with(&first, listener.clone())?;

    let err = manager
        .execute_with(&Task::<(), ()>::new("sync", |_| async {}), listener.clone())
        .unwrap_err();
    assert_eq!(err, TaskError::DuplicateTag { tag: "sync".into() });

    settle(&mut event_loop).await?;
    assert!(!manager.is_active("sync"));

    manager.execute_with(&Task::<(), ()>::new("sync", |_| async {}), listener)?;
    settle(&mut event_loop).await?;
    assert_eq!(count.get(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn result_follows_the_state_machine() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let (listener, _) = counting_listener();

    let done: Task<(), String> = Task::new("done", |_| async { "value".to_string() });
    assert!(matches!(done.result(), Err(TaskError::IllegalState { .. })));
    manager.execute_with(&done, listener.clone())?;
    settle(&mut event_loop).await?;
    assert_eq!(done.result()?.as_str(), "value");
    assert_eq!(done.to_ref().result::<String>()?.as_str(), "value");

    let interrupted = parked("interrupted");
    manager.execute_with(&interrupted, listener)?;
    manager.cancel_all();
    settle(&mut event_loop).await?;
    assert!(interrupted.is_finished());
    assert!(matches!(
        interrupted.result(),
        Err(TaskError::IllegalState { .. })
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn buffered_cancellation_reaches_advanced_listeners_only() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let journal = Rc::new(Journal::default());
    manager.set_ui_ready(false);

    let (basic, count) = counting_listener();
    let to_basic = parked("to-basic");
    let to_advanced = parked("to-advanced");
    manager.execute_with(&to_basic, basic.clone())?;
    manager.execute_with(&to_advanced, basic.clone())?;
    assert_eq!(manager.cancel_all(), 2);
    settle(&mut event_loop).await?;

    assert_eq!(to_basic.pending_delivery(), Some(Terminal::Cancelled));
    assert_eq!(to_advanced.pending_delivery(), Some(Terminal::Cancelled));

    to_basic.set_listener(basic);
    assert_eq!(count.get(), 0);
    assert!(!to_basic.has_pending_delivery());

    to_advanced.set_listener(Screen::new("screen", journal.clone()));
    assert_eq!(journal.entries(), vec!["screen:cancelled:to-advanced"]);
    assert!(!to_advanced.has_pending_delivery());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn late_cancellation_keeps_resubmitted_entry() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let journal = Rc::new(Journal::default());

    let old = parked("job");
    manager.execute_with(&old, Screen::new("old", journal.clone()))?;
    manager.cancel("job");

    let new = parked("job");
    manager.execute_with(&new, Screen::new("new", journal.clone()))?;

    while !old.is_finished() {
        tokio::time::timeout(Duration::from_secs(5), event_loop.dispatch_next())
            .await
            .expect("delivery loop stalled")?;
    }
    assert!(manager.get_task("job").is_some_and(|t| t == new.to_ref()));
    assert!(journal
        .entries()
        .contains(&"old:cancelled:job".to_string()));

    manager.cancel("job");
    settle(&mut event_loop).await?;
    assert!(manager.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reattach_with_missing_listener_attaches_nothing() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let (listener, count) = counting_listener();
    manager.set_ui_ready(false);

    for tag in ["one", "two"] {
        manager.execute_with(&Task::<(), ()>::new(tag, |_| async {}), listener.clone())?;
    }
    settle(&mut event_loop).await?;

    let partial = move |task: &TaskRef, _: bool| (task.tag() == "one").then(|| listener.clone());
    let err = manager.reattach_all(&partial).unwrap_err();
    assert_eq!(err, TaskError::MissingListener { tag: "two".into() });
    assert_eq!(count.get(), 0);
    assert!(manager.get_task("one").is_some_and(|t| !t.has_listener()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn saturated_pool_rejects_without_registering() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let cfg = Config {
        workers: 1,
        queue_capacity: 1,
        ..Config::default()
    };
    let pool = WorkerPool::current(&cfg)?;
    let manager = TaskManager::builder(cfg, event_loop.handle())
        .with_pool(pool)
        .build()?;
    let journal = Rc::new(Journal::default());

    manager.execute_with(&parked("run"), Screen::new("s", journal.clone()))?;
    manager.execute_with(&parked("wait"), Screen::new("s", journal.clone()))?;
    let err = manager
        .execute_with(&parked("over"), Screen::new("s", journal.clone()))
        .unwrap_err();

    assert_eq!(
        err,
        TaskError::Rejected {
            tag: "over".into(),
            source: ExecutorError::Saturated { capacity: 2 },
        }
    );
    assert!(!manager.is_active("over"));
    assert!(journal.entries().contains(&"s:cancelled:over".to_string()));

    manager.cancel_all();
    settle(&mut event_loop).await?;
    assert!(manager.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn progress_arrives_between_start_and_finish() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let journal = Rc::new(Journal::default());

    let task: Task<u32, ()> = Task::new("upload", |ctx| async move {
        for pct in [25, 50, 100] {
            ctx.publish_progress(pct);
            tokio::task::yield_now().await;
        }
    });
    manager.execute_with(&task, Screen::new("ui", journal.clone()))?;
    settle(&mut event_loop).await?;

    assert_eq!(
        journal.entries(),
        vec![
            "ui:pre:upload",
            "ui:progress:upload:25",
            "ui:progress:upload:50",
            "ui:progress:upload:100",
            "ui:post:upload",
        ]
    );
    assert_eq!(*task.last_progress()?.expect("progress was published"), 100);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_computation_surfaces_from_the_loop() -> anyhow::Result<()> {
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let (listener, count) = counting_listener();

    let task: Task<(), ()> = Task::new("crash", |_| async { panic!("disk on fire") });
    manager.execute_with(&task, listener)?;

    let err = settle(&mut event_loop).await.unwrap_err();
    assert_eq!(
        err,
        TaskError::Computation {
            tag: "crash".into(),
            message: "disk on fire".into(),
        }
    );
    assert!(task.is_finished());
    assert_eq!(count.get(), 0);
    assert!(task.is_failed());
    // The entry stays until it is explicitly cancelled, and counts as undelivered.
    assert!(manager.is_active("crash"));
    assert!(!manager.is_result_delivered("crash"));
    assert!(manager.cancel("crash").is_some());
    Ok(())
}
