//! # Listeners: where task callbacks go.
//!
//! Two capability tiers exist:
//! - [`Listener`] (basic) receives `on_pre_execute` and `on_post_execute`;
//! - [`AdvancedListener`] additionally receives progress and cancellation.
//!
//! A listener advertises the advanced tier through [`Listener::as_advanced`].
//! Callbacks take `&self`: listeners are shared (`Rc`) between the owner and the
//! task, so state they update lives behind `Cell`/`RefCell`.
//!
//! ## Example
//! ```rust
//! use std::any::Any;
//! use std::cell::Cell;
//! use taskhold::{AdvancedListener, Listener, TaskRef};
//!
//! #[derive(Default)]
//! struct Screen {
//!     done: Cell<bool>,
//! }
//!
//! impl Listener for Screen {
//!     fn on_post_execute(&self, _task: &TaskRef) {
//!         self.done.set(true);
//!     }
//!     fn as_advanced(&self) -> Option<&dyn AdvancedListener> {
//!         Some(self)
//!     }
//! }
//!
//! impl AdvancedListener for Screen {
//!     fn on_progress(&self, _task: &TaskRef, progress: &dyn Any) {
//!         if let Some(pct) = progress.downcast_ref::<u8>() {
//!             let _ = pct;
//!         }
//!     }
//!     fn on_cancelled(&self, _task: &TaskRef) {}
//! }
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::tasks::state::Terminal;
use crate::tasks::task_ref::TaskRef;

/// Shared listener handle.
pub type ListenerRef = Rc<dyn Listener>;

/// Basic delivery target: start and completion.
pub trait Listener {
    /// Called on the delivery context right after the task was started.
    fn on_pre_execute(&self, task: &TaskRef) {
        let _ = task;
    }

    /// Called on the delivery context when the task completed normally.
    fn on_post_execute(&self, task: &TaskRef);

    /// Exposes the advanced tier, if this listener implements it.
    fn as_advanced(&self) -> Option<&dyn AdvancedListener> {
        None
    }
}

/// Advanced delivery target: progress and cancellation on top of [`Listener`].
pub trait AdvancedListener: Listener {
    /// Called for each progress value; downcast `progress` to the task's `P`.
    fn on_progress(&self, task: &TaskRef, progress: &dyn Any);

    /// Called instead of `on_post_execute` when the task was cancelled.
    fn on_cancelled(&self, task: &TaskRef);
}

/// Builds a basic listener from a completion closure.
pub fn listener_fn<F>(f: F) -> ListenerRef
where
    F: Fn(&TaskRef) + 'static,
{
    Rc::new(FnListener(f))
}

struct FnListener<F>(F);

impl<F> Listener for FnListener<F>
where
    F: Fn(&TaskRef),
{
    fn on_post_execute(&self, task: &TaskRef) {
        (self.0)(task)
    }
}

/// Single-slot listener reference plus the buffered terminal outcome.
pub(crate) struct ListenerSlot {
    listener: RefCell<Option<ListenerRef>>,
    pending: Cell<Option<Terminal>>,
}

impl ListenerSlot {
    pub(crate) fn new() -> Self {
        Self {
            listener: RefCell::new(None),
            pending: Cell::new(None),
        }
    }

    pub(crate) fn current(&self) -> Option<ListenerRef> {
        self.listener.borrow().clone()
    }

    pub(crate) fn pending(&self) -> Option<Terminal> {
        self.pending.get()
    }

    /// Replaces the listener and flushes a buffered outcome into it.
    pub(crate) fn attach(&self, task: &TaskRef, listener: ListenerRef) {
        *self.listener.borrow_mut() = Some(listener.clone());
        if let Some(terminal) = self.pending.take() {
            notify_terminal(task, listener.as_ref(), terminal);
        }
    }

    pub(crate) fn detach(&self) -> Option<ListenerRef> {
        self.listener.borrow_mut().take()
    }

    pub(crate) fn pre_execute(&self, task: &TaskRef) {
        if let Some(listener) = self.current() {
            listener.on_pre_execute(task);
        }
    }

    pub(crate) fn progress(&self, task: &TaskRef, progress: &dyn Any) {
        if let Some(listener) = self.current() {
            if let Some(advanced) = listener.as_advanced() {
                advanced.on_progress(task, progress);
            }
        }
    }

    /// Delivers `terminal` to the current listener, or buffers it.
    pub(crate) fn deliver(&self, task: &TaskRef, terminal: Terminal) {
        match self.current() {
            Some(listener) => {
                self.pending.set(None);
                notify_terminal(task, listener.as_ref(), terminal);
            }
            None => self.pending.set(Some(terminal)),
        }
    }
}

fn notify_terminal(task: &TaskRef, listener: &dyn Listener, terminal: Terminal) {
    match terminal {
        Terminal::Completed => listener.on_post_execute(task),
        // A basic listener cannot represent cancellation; the attempt still counts.
        Terminal::Cancelled => {
            if let Some(advanced) = listener.as_advanced() {
                advanced.on_cancelled(task);
            }
        }
    }
}
