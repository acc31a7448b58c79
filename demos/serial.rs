//! # Example: serial
//!
//! Feeds three jobs through the serial lane and prints manager events through
//! the built-in [`LogWriter`] subscriber.
//!
//! Shows how to:
//! - Submit tasks with [`TaskManager::execute_serial`]
//! - Observe manager events with a [`Subscribe`] implementation
//!
//! ## Flow
//! ```text
//! execute_serial(step-1) ─► execute_serial(step-2) ─► execute_serial(step-3)
//!        │ runs alone            │ starts after step-1     │ starts after step-2
//!        ▼                       ▼                         ▼
//!   on_post_execute         on_post_execute           on_post_execute
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example serial --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use taskhold::{Config, DeliveryLoop, LogWriter, Subscribe, Task, TaskManager, listener_fn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    println!("=== serial example ===\n");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::builder(Config::default(), event_loop.handle())
        .with_subscribers(subs)
        .build()?;

    for (step, millis) in [(1u32, 120u64), (2, 10), (3, 60)] {
        let task: Task<(), u32> = Task::new(format!("step-{step}"), move |ctx| async move {
            println!("{} running", ctx.tag());
            tokio::time::sleep(Duration::from_millis(millis)).await;
            step
        });
        let done = listener_fn(|task| {
            println!("{} done -> {:?}", task.tag(), task.result::<u32>().map(|n| *n));
        });
        manager.execute_serial(&task, Some(done))?;
    }

    event_loop.run_until_idle().await?;
    // Let the subscriber worker flush the last events.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
