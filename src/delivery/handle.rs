//! # Delivery handle and worker-side notifiers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::error::TaskError;

/// Process-wide counter for task ids.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a task object.
///
/// Unlike the tag, the id is never reused: a task resubmitted under the same tag
/// gets a different id, so late notifications always reach the right object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(TASK_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of draining one task's channels.
pub(crate) enum Pumped {
    /// Progress (if any) was delivered; the computation is still running.
    Idle,
    /// The terminal outcome was processed.
    Finished,
    /// The computation panicked or was abandoned.
    Failed(TaskError),
}

/// Delivery-side half of an in-flight task.
pub(crate) trait Pump {
    fn pump(self: Rc<Self>) -> Pumped;
}

type InFlight = Rc<RefCell<HashMap<TaskId, Rc<dyn Pump>>>>;

/// Cloneable, thread-bound access to a [`DeliveryLoop`](crate::DeliveryLoop).
///
/// Tasks register here when they start; managers keep one to start tasks on.
#[derive(Clone)]
pub struct DeliveryHandle {
    tx: mpsc::UnboundedSender<TaskId>,
    in_flight: InFlight,
}

impl DeliveryHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<TaskId>) -> Self {
        Self {
            tx,
            in_flight: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Number of started tasks whose outcome has not been dispatched yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.borrow().len()
    }

    pub(crate) fn register(&self, id: TaskId, pump: Rc<dyn Pump>) {
        self.in_flight.borrow_mut().insert(id, pump);
    }

    pub(crate) fn unregister(&self, id: TaskId) {
        self.in_flight.borrow_mut().remove(&id);
    }

    pub(crate) fn lookup(&self, id: TaskId) -> Option<Rc<dyn Pump>> {
        self.in_flight.borrow().get(&id).cloned()
    }

    pub(crate) fn notifier(&self, id: TaskId) -> Notifier {
        Notifier {
            id,
            tx: self.tx.clone(),
        }
    }
}

impl fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// `Send` half used by workers to wake the delivery context for one task.
#[derive(Clone, Debug)]
pub(crate) struct Notifier {
    id: TaskId,
    tx: mpsc::UnboundedSender<TaskId>,
}

impl Notifier {
    /// Wakes the delivery context; a closed loop is ignored.
    pub(crate) fn notify(&self) {
        let _ = self.tx.send(self.id);
    }

    pub(crate) fn into_guard(self) -> CompletionGuard {
        CompletionGuard(self)
    }
}

/// Notifies on drop, so a job that is dropped before sending its outcome
/// (runtime shutdown, abort) still wakes the delivery context.
#[derive(Debug)]
pub(crate) struct CompletionGuard(Notifier);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.notify();
    }
}
