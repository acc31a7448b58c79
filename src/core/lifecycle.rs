//! # LifecycleProxy: owner lifecycle glue.
//!
//! Hosts with a start/stop/destroy lifecycle (screens, sessions, plugin
//! instances) forward their transitions here:
//!
//! ```text
//! new(manager, resolver) ── set_owner(resolver)
//! on_start()   ── ui_ready = true  ── reattach_all(resolver)   (buffered outcomes delivered)
//! on_stop()    ── ui_ready = false ── detach_all()
//! on_destroy() ── detach_owner() if still ours ── strict ? assert_all_tasks_detached()
//! ```

use crate::core::manager::TaskManager;
use crate::core::resolver::ResolverRef;
use crate::error::TaskError;

/// Binds one owner's lifecycle to a [`TaskManager`].
///
/// # Example
/// ```rust
/// use std::rc::Rc;
/// use taskhold::{DeliveryLoop, LifecycleProxy, ListenerRef, TaskManager, TaskRef};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let event_loop = DeliveryLoop::new();
///     let manager = TaskManager::new(event_loop.handle())?;
///     let proxy = LifecycleProxy::new(
///         manager.clone(),
///         Rc::new(|_: &TaskRef, _: bool| -> Option<ListenerRef> { None }),
///     );
///
///     proxy.on_start()?;
///     proxy.on_stop();
///     proxy.on_destroy()?;
///     assert!(!manager.has_owner());
///     Ok(())
/// }
/// ```
pub struct LifecycleProxy {
    manager: TaskManager,
    resolver: ResolverRef,
}

impl LifecycleProxy {
    /// Installs `resolver` as the manager's owner.
    pub fn new(manager: TaskManager, resolver: ResolverRef) -> Self {
        manager.set_owner(resolver.clone());
        Self { manager, resolver }
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    /// The owner became observable: rebind every registered task.
    pub fn on_start(&self) -> Result<usize, TaskError> {
        self.manager.set_ui_ready(true);
        self.manager.reattach_all(self.resolver.as_ref())
    }

    /// The owner stopped being observable: outcomes are buffered from now on.
    pub fn on_stop(&self) -> usize {
        self.manager.set_ui_ready(false);
        self.manager.detach_all()
    }

    /// The owner is gone for good.
    pub fn on_destroy(&self) -> Result<(), TaskError> {
        if self.manager.is_owned_by(&self.resolver) {
            self.manager.detach_owner();
        }
        if self.manager.is_strict() {
            self.manager.assert_all_tasks_detached()?;
        }
        Ok(())
    }
}
