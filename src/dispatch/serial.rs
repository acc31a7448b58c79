//! # Serial lane.
//!
//! [`SerialExecutor`] preserves submission order across otherwise concurrent
//! submissions: job *N+1* never starts before job *N* has completed, although
//! every job still runs on a [`WorkerPool`] thread.
//!
//! ```text
//! execute(job) ──► [unbounded FIFO] ──► driver ──► pool.run_queued(job) ──► await completion
//!                                          └──────────── next job ◄──────────────┘
//! ```
//!
//! The driver waits for pool admission instead of failing, so a saturated pool
//! slows the lane down without rejecting its jobs.

use tokio::sync::mpsc;
use tracing::warn;

use crate::dispatch::executor::{Executor, Job};
use crate::dispatch::pool::WorkerPool;
use crate::error::ExecutorError;

/// Strictly ordered executor funnelling jobs through a pool one at a time.
#[derive(Debug)]
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialExecutor {
    /// Creates the lane and spawns its driver on the pool's runtime.
    pub fn new(pool: WorkerPool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = pool.handle().clone();

        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                let join = match pool.run_queued(job).await {
                    Ok(join) => join,
                    Err(err) => {
                        warn!(error = %err, "serial lane stopped: pool closed");
                        break;
                    }
                };
                if let Err(err) = join.await {
                    warn!(error = %err, "serial job did not complete");
                }
            }
        });

        Self { tx }
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, job: Job) -> Result<(), ExecutorError> {
        self.tx.send(job).map_err(|_| ExecutorError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::FutureExt;

    use crate::config::Config;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn jobs_never_overlap_and_keep_submission_order() {
        let pool = WorkerPool::current(&Config::default()).unwrap();
        let serial = SerialExecutor::new(pool);
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        for i in 0..5u64 {
            let log = log.clone();
            let done_tx = done_tx.clone();
            serial
                .execute(
                    async move {
                        log.lock().unwrap().push(format!("start-{i}"));
                        // Earlier jobs sleep longer; a parallel pool would reorder them.
                        tokio::time::sleep(Duration::from_millis(25 - i * 5)).await;
                        log.lock().unwrap().push(format!("end-{i}"));
                        let _ = done_tx.send(());
                    }
                    .boxed(),
                )
                .unwrap();
        }
        for _ in 0..5 {
            done_rx.recv().await.unwrap();
        }

        let expected: Vec<String> = (0..5)
            .flat_map(|i| [format!("start-{i}"), format!("end-{i}")])
            .collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waits_for_admission_instead_of_rejecting() {
        let cfg = Config {
            workers: 1,
            queue_capacity: 1,
            ..Config::default()
        };
        let pool = WorkerPool::current(&cfg).unwrap();
        let serial = SerialExecutor::new(pool.clone());
        let gate = tokio_util::sync::CancellationToken::new();

        // Fill the pool directly.
        for _ in 0..2 {
            let gate = gate.clone();
            pool.execute(async move { gate.cancelled().await }.boxed())
                .unwrap();
        }

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        serial
            .execute(
                async move {
                    let _ = done_tx.send(());
                }
                .boxed(),
            )
            .unwrap();

        gate.cancel();
        tokio::time::timeout(Duration::from_secs(2), done_rx)
            .await
            .unwrap()
            .unwrap();
    }
}
