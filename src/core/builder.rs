use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::manager::TaskManager;
use crate::{
    config::Config,
    delivery::DeliveryHandle,
    dispatch::{Executor, SerialExecutor, WorkerPool},
    error::ExecutorError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`TaskManager`] with optional features.
pub struct TaskManagerBuilder {
    cfg: Config,
    delivery: DeliveryHandle,
    pool: Option<WorkerPool>,
    executor: Option<Arc<dyn Executor>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl TaskManagerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config, delivery: DeliveryHandle) -> Self {
        Self {
            cfg,
            delivery,
            pool: None,
            executor: None,
            subscribers: Vec::new(),
        }
    }

    /// Uses `pool` for the default executor, the serial lane and subscriber workers.
    ///
    /// Without it, a pool is created on the current runtime.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Replaces the default parallel executor used by `execute`/`execute_with`.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive manager events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the manager.
    ///
    /// This consumes the builder and initializes:
    /// - the worker pool (unless one was given) and the serial lane on it;
    /// - the event bus;
    /// - the subscriber listener, when subscribers were set.
    ///
    /// # Errors
    /// [`ExecutorError::NoRuntime`] when no pool was given and the caller is
    /// not inside a tokio runtime.
    pub fn build(self) -> Result<TaskManager, ExecutorError> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => WorkerPool::current(&self.cfg)?,
        };
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(pool.clone()) as Arc<dyn Executor>);
        let serial = SerialExecutor::new(pool.clone());
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let shutdown = CancellationToken::new();

        if !self.subscribers.is_empty() {
            spawn_subscriber_listener(&pool, self.subscribers, bus.clone(), shutdown.clone());
        }

        Ok(TaskManager::new_internal(
            &self.cfg,
            self.delivery,
            executor,
            serial,
            bus,
            shutdown,
        ))
    }
}

/// Fans bus events out to subscribers until the manager is dropped.
fn spawn_subscriber_listener(
    pool: &WorkerPool,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Bus,
    shutdown: CancellationToken,
) {
    let set = SubscriberSet::new(subscribers, bus.clone(), pool.handle());
    let mut rx = bus.subscribe();

    pool.handle().spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        set.shutdown().await;
    });
}
