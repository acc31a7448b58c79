//! # Example: reattach
//!
//! An owner goes away while its task runs; a recreated owner picks up the
//! result that was produced in between.
//!
//! Shows how to:
//! - Drive the delivery loop from a plain thread with [`Config::build_runtime`]
//! - Bind an owner's lifecycle with [`LifecycleProxy`]
//! - Resolve listeners by tag on reattachment
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► runtime = cfg.build_runtime()
//!   ├─► first owner: on_start ─► execute("report") ─► on_stop   (outcome buffered)
//!   ├─► block_on(run_until_idle)
//!   ├─► first owner: on_destroy
//!   └─► second owner: on_start ─► reattach_all ─► on_post_execute("report")
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example reattach
//! ```

use std::rc::Rc;
use std::time::Duration;

use taskhold::{
    Config, DeliveryLoop, LifecycleProxy, ListenerRef, ResolverRef, Task, TaskManager, TaskRef,
    WorkerPool, listener_fn,
};

/// A screen instance; `generation` tells the two owners apart.
fn owner(generation: u32) -> ResolverRef {
    let report = listener_fn(move |task: &TaskRef| {
        let lines = task.result::<usize>().map(|n| *n).unwrap_or_default();
        println!("owner #{generation} got '{}': {lines} lines", task.tag());
    });
    Rc::new(move |task: &TaskRef, is_reattach: bool| -> Option<ListenerRef> {
        println!("owner #{generation} resolving '{}' (reattach={is_reattach})", task.tag());
        (task.tag() == "report").then(|| report.clone())
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    println!("=== reattach example ===\n");

    let cfg = Config {
        workers: 2,
        ..Config::default()
    };
    let runtime = cfg.build_runtime()?;
    let pool = WorkerPool::new(runtime.handle().clone(), &cfg);

    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::builder(cfg, event_loop.handle())
        .with_pool(pool)
        .build()?;

    let first = LifecycleProxy::new(manager.clone(), owner(1));
    first.on_start()?;

    let report: Task<(), usize> = Task::blocking("report", |_ctx| {
        std::thread::sleep(Duration::from_millis(100));
        42
    });
    manager.execute(&report)?;

    // The first owner stops before the report is ready.
    first.on_stop();
    runtime.block_on(event_loop.run_until_idle())?;
    println!("buffered outcome: {:?}", report.pending_delivery());
    first.on_destroy()?;

    let second = LifecycleProxy::new(manager.clone(), owner(2));
    let rebound = second.on_start()?;
    println!("rebound {rebound} task(s); registry empty: {}", manager.is_empty());
    Ok(())
}
