//! # Registry shadow listener.
//!
//! Every listener the manager attaches is wrapped in a [`ListenerShadow`]. The
//! shadow is always advanced, so the task reports progress and cancellation to
//! it; it forwards each callback according to the wrapped listener's tier.
//!
//! On a terminal callback the shadow first removes the task from the registry,
//! but only when the registered entry is the same task object: a task
//! resubmitted under the same tag keeps its entry.

use std::any::Any;
use std::rc::Weak;

use tracing::info;

use crate::core::manager::ManagerInner;
use crate::events::{Event, EventKind};
use crate::tasks::{AdvancedListener, Listener, ListenerRef, TaskRef};

pub(crate) struct ListenerShadow {
    manager: Weak<ManagerInner>,
    inner: ListenerRef,
}

impl ListenerShadow {
    pub(crate) fn new(manager: Weak<ManagerInner>, inner: ListenerRef) -> Self {
        Self { manager, inner }
    }

    fn release(&self, task: &TaskRef, kind: EventKind) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        if manager.remove_if_same(task) {
            manager.publish(Event::new(kind).with_task(task.tag()));
        } else if manager.is_registered(task.tag()) {
            info!(
                task = task.tag(),
                id = %task.id(),
                "finished task was replaced under the same tag; keeping the newer entry"
            );
        }
    }
}

impl Listener for ListenerShadow {
    fn on_pre_execute(&self, task: &TaskRef) {
        self.inner.on_pre_execute(task);
    }

    fn on_post_execute(&self, task: &TaskRef) {
        self.release(task, EventKind::ResultDelivered);
        self.inner.on_post_execute(task);
    }

    fn as_advanced(&self) -> Option<&dyn AdvancedListener> {
        Some(self)
    }
}

impl AdvancedListener for ListenerShadow {
    fn on_progress(&self, task: &TaskRef, progress: &dyn Any) {
        if let Some(advanced) = self.inner.as_advanced() {
            advanced.on_progress(task, progress);
        }
    }

    fn on_cancelled(&self, task: &TaskRef) {
        self.release(task, EventKind::CancellationDelivered);
        if let Some(advanced) = self.inner.as_advanced() {
            advanced.on_cancelled(task);
        }
    }
}
