//! # LogWriter: manager events as `tracing` records
//!
//! A minimal subscriber that forwards every [`Event`] to `tracing`.
//! Install a `tracing` subscriber (e.g. `tracing-subscriber`'s `fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO taskhold: [submitted] task="download"
//! WARN taskhold: [rejected] task="upload" reason="executor_saturated"
//! INFO taskhold: [tasks-reattached] count=3
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = e.kind.as_str();
        let task = e.task.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::TaskRejected | EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(
                    target: "taskhold",
                    seq = e.seq,
                    "[{label}] task={task:?} reason={:?}",
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::AllCancelRequested
            | EventKind::ListenersDetached
            | EventKind::TasksReattached => {
                info!(target: "taskhold", seq = e.seq, "[{label}] count={}", e.count.unwrap_or(0));
            }
            EventKind::TaskSubmitted => match e.reason.as_deref() {
                Some(reason) => {
                    info!(target: "taskhold", seq = e.seq, "[{label}] task={task:?} ({reason})")
                }
                None => info!(target: "taskhold", seq = e.seq, "[{label}] task={task:?}"),
            },
            EventKind::TaskCancelRequested
            | EventKind::ResultDelivered
            | EventKind::CancellationDelivered
            | EventKind::ListenerAttached => {
                info!(target: "taskhold", seq = e.seq, "[{label}] task={task:?}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
