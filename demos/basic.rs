//! # Example: basic
//!
//! Runs two tasks through a [`TaskManager`] and watches their callbacks.
//!
//! Shows how to:
//! - Write an advanced listener that receives progress and cancellation
//! - Submit tasks with an explicit listener
//! - Cancel one task by tag while the other completes
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► execute_with("download", screen)   ── progress 0..100 ─► on_post_execute
//!   ├─► execute_with("index", screen)      ── waits for cancellation
//!   ├─► cancel("index")                    ── tag freed immediately ─► on_cancelled
//!   └─► event_loop.run_until_idle()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic
//! ```

use std::any::Any;
use std::time::Duration;

use taskhold::{AdvancedListener, DeliveryLoop, Listener, Task, TaskManager, TaskRef};
use tracing_subscriber::EnvFilter;

struct Screen;

impl Listener for Screen {
    fn on_pre_execute(&self, task: &TaskRef) {
        println!("[{}] started", task.tag());
    }

    fn on_post_execute(&self, task: &TaskRef) {
        match task.result::<u64>() {
            Ok(bytes) => println!("[{}] finished: {bytes} bytes", task.tag()),
            Err(err) => println!("[{}] finished without value: {err}", task.tag()),
        }
    }

    fn as_advanced(&self) -> Option<&dyn AdvancedListener> {
        Some(self)
    }
}

impl AdvancedListener for Screen {
    fn on_progress(&self, task: &TaskRef, progress: &dyn Any) {
        if let Some(pct) = progress.downcast_ref::<u8>() {
            println!("[{}] {pct}%", task.tag());
        }
    }

    fn on_cancelled(&self, task: &TaskRef) {
        println!("[{}] cancelled", task.tag());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    println!("=== basic example ===\n");

    let mut event_loop = DeliveryLoop::new();
    let manager = TaskManager::new(event_loop.handle())?;
    let screen = std::rc::Rc::new(Screen);

    let download: Task<u8, u64> = Task::new("download", |ctx| async move {
        let mut bytes = 0u64;
        for pct in (0..=100u8).step_by(25) {
            if ctx.is_cancelled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            bytes += 1024;
            ctx.publish_progress(pct);
        }
        bytes
    });
    manager.execute_with(&download, screen.clone())?;

    let index: Task<u8, u64> = Task::new("index", |ctx| async move {
        ctx.cancelled().await;
        0
    });
    manager.execute_with(&index, screen)?;
    println!("active: {:?}", manager.tags());

    manager.cancel("index");
    println!("after cancel: {:?}", manager.tags());

    event_loop.run_until_idle().await?;
    println!("\nregistry empty: {}", manager.is_empty());
    Ok(())
}
