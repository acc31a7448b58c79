//! # Task manager events.
//!
//! The [`EventKind`] enum classifies what the manager reports:
//! - **Submission events**: a task was handed to an executor, or refused
//! - **Delivery events**: a terminal outcome reached a listener through the registry
//! - **Binding events**: listeners were attached, detached or rebound
//! - **Subscriber events**: overflow and panics inside event subscribers
//!
//! The [`Event`] struct carries the tag of the task involved and an optional reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Subscribers run on worker tasks, so use `seq` to restore the publishing order.
//!
//! ## Example
//! ```rust
//! use taskhold::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskRejected)
//!     .with_task("download")
//!     .with_reason("executor_saturated");
//!
//! assert_eq!(ev.kind, EventKind::TaskRejected);
//! assert_eq!(ev.task.as_deref(), Some("download"));
//! assert_eq!(ev.reason.as_deref(), Some("executor_saturated"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of manager events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Submission ===
    /// Task registered and handed to an executor.
    ///
    /// Sets `task`; `reason` is `"detached"` when the owner was not ready.
    TaskSubmitted,

    /// Task registration or start failed.
    ///
    /// Sets `task` and `reason` (error label).
    TaskRejected,

    /// `cancel(tag)` removed a task from the registry and cancelled it.
    ///
    /// Sets `task`.
    TaskCancelRequested,

    /// `cancel_all()` requested interruption of every registered task.
    ///
    /// Sets `count`.
    AllCancelRequested,

    // === Delivery ===
    /// Completion delivered; the task left the registry.
    ///
    /// Sets `task`.
    ResultDelivered,

    /// Cancellation delivered; the task left the registry (if still registered).
    ///
    /// Sets `task`.
    CancellationDelivered,

    // === Binding ===
    /// A listener was attached to a registered task.
    ///
    /// Sets `task`.
    ListenerAttached,

    /// Listeners were removed from registered tasks.
    ///
    /// Sets `count`.
    ListenersDetached,

    /// Every registered task was rebound to a freshly resolved listener.
    ///
    /// Sets `count`.
    TasksReattached,

    // === Subscribers ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name) and `reason`.
    SubscriberOverflow,
}

impl EventKind {
    /// Short stable label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskSubmitted => "submitted",
            EventKind::TaskRejected => "rejected",
            EventKind::TaskCancelRequested => "cancel-requested",
            EventKind::AllCancelRequested => "cancel-all-requested",
            EventKind::ResultDelivered => "result-delivered",
            EventKind::CancellationDelivered => "cancellation-delivered",
            EventKind::ListenerAttached => "listener-attached",
            EventKind::ListenersDetached => "listeners-detached",
            EventKind::TasksReattached => "tasks-reattached",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        }
    }
}

/// One manager event. Which optional fields are set depends on [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Publishing order across the process.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    pub kind: EventKind,
    /// Task tag, or subscriber name for subscriber events.
    pub task: Option<Arc<str>>,
    /// Error label, panic message or overflow cause.
    pub reason: Option<Arc<str>>,
    /// Number of tasks affected by a bulk operation.
    pub count: Option<usize>,
}

impl Event {
    /// Stamps a new event with the next `seq` and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            count: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
