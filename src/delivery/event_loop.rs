//! # DeliveryLoop: the owner side of the delivery context.
//!
//! Embedders call one of the dispatch methods from the interaction thread:
//! - [`DeliveryLoop::dispatch_pending`] from an existing UI/event loop tick (never blocks);
//! - [`DeliveryLoop::dispatch_next`] / [`DeliveryLoop::run_until_idle`] when the thread
//!   is itself driven by tokio (`block_on`, `LocalSet`, `#[tokio::test]`).
//!
//! A failing computation does not stop the loop: the error is returned from the
//! dispatch call that observed it and later notifications stay queued.

use std::fmt;

use tokio::sync::mpsc;
use tracing::error;

use crate::delivery::handle::{DeliveryHandle, Pumped, TaskId};
use crate::error::TaskError;

/// Single-threaded dispatcher of task progress and outcomes.
pub struct DeliveryLoop {
    rx: mpsc::UnboundedReceiver<TaskId>,
    handle: DeliveryHandle,
}

impl DeliveryLoop {
    /// Creates an empty loop bound to the current thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: DeliveryHandle::new(tx),
        }
    }

    /// Returns a handle for tasks and managers that deliver through this loop.
    pub fn handle(&self) -> DeliveryHandle {
        self.handle.clone()
    }

    /// Number of started tasks whose outcome has not been dispatched yet.
    pub fn in_flight(&self) -> usize {
        self.handle.in_flight()
    }

    /// Dispatches every notification queued so far without waiting.
    ///
    /// Returns how many notifications were processed.
    pub fn dispatch_pending(&mut self) -> Result<usize, TaskError> {
        let mut dispatched = 0;
        while let Ok(id) = self.rx.try_recv() {
            dispatched += 1;
            self.dispatch(id)?;
        }
        Ok(dispatched)
    }

    /// Waits for the next notification and dispatches it.
    pub async fn dispatch_next(&mut self) -> Result<(), TaskError> {
        match self.rx.recv().await {
            Some(id) => self.dispatch(id),
            // The loop keeps a sender inside its own handle, so this is unreachable
            // in practice; treat it as "nothing to do".
            None => Ok(()),
        }
    }

    /// Dispatches until no started task is waiting for its outcome.
    pub async fn run_until_idle(&mut self) -> Result<(), TaskError> {
        while self.in_flight() > 0 {
            self.dispatch_next().await?;
        }
        self.dispatch_pending().map(|_| ())
    }

    fn dispatch(&self, id: TaskId) -> Result<(), TaskError> {
        let Some(pump) = self.handle.lookup(id) else {
            return Ok(());
        };
        match pump.pump() {
            Pumped::Idle => Ok(()),
            Pumped::Finished => {
                self.handle.unregister(id);
                Ok(())
            }
            Pumped::Failed(err) => {
                self.handle.unregister(id);
                error!(task = err.tag(), error = %err, "background computation failed");
                Err(err)
            }
        }
    }
}

impl Default for DeliveryLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeliveryLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryLoop")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
