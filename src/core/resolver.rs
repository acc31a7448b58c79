//! # Resolver: the owner-side seam of listener rebinding.
//!
//! A [`Resolver`] maps a registered task to the listener that should receive its
//! callbacks. The manager asks its owner's resolver when a task is submitted
//! without a listener (`is_reattach == false`) and every registered task when
//! the owner becomes observable again (`is_reattach == true`).
//!
//! Any `Fn(&TaskRef, bool) -> Option<ListenerRef>` closure is a resolver.

use std::rc::Rc;

use crate::tasks::{ListenerRef, TaskRef};

/// Shared resolver handle (the manager's owner).
pub type ResolverRef = Rc<dyn Resolver>;

/// Provides listeners for tasks, typically by matching on [`TaskRef::tag`].
///
/// # Example
/// ```rust
/// use std::rc::Rc;
/// use taskhold::{ListenerRef, Resolver, TaskRef, listener_fn};
///
/// let download: ListenerRef = listener_fn(|task| println!("{} done", task.tag()));
/// let resolver = move |task: &TaskRef, _is_reattach: bool| -> Option<ListenerRef> {
///     (task.tag() == "download").then(|| download.clone())
/// };
/// let _owner: Rc<dyn Resolver> = Rc::new(resolver);
/// ```
pub trait Resolver {
    /// Returns the listener for `task`, or `None` when this owner has none.
    fn resolve(&self, task: &TaskRef, is_reattach: bool) -> Option<ListenerRef>;
}

impl<F> Resolver for F
where
    F: Fn(&TaskRef, bool) -> Option<ListenerRef>,
{
    fn resolve(&self, task: &TaskRef, is_reattach: bool) -> Option<ListenerRef> {
        self(task, is_reattach)
    }
}
