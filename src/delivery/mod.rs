//! The delivery context: the single logical thread that observes task outcomes.
//!
//! Workers never touch task state directly. They push values into per-task
//! channels and then *notify* the delivery context with the task's [`TaskId`].
//! The owner of the [`DeliveryLoop`] (the interaction thread) dispatches those
//! notifications, which drains the task's channels and runs hooks and listener
//! callbacks in place.
//!
//! ## Architecture
//! ```text
//! worker thread                            delivery thread (owns DeliveryLoop)
//! ─────────────                            ───────────────────────────────────
//! ctx.publish_progress(p) ─► progress tx
//!                         └► notify(id) ─► [id channel] ─► dispatch(id)
//! outcome tx.send(r)                                         └─► in_flight[id].pump()
//! guard drop ──────────────► notify(id) ─►                         ├─ drain progress ─► hooks, listener
//!                                                                  └─ take outcome   ─► finish()
//! ```
//!
//! ## Rules
//! - Everything reachable from [`DeliveryHandle`] is `!Send`: it stays on the delivery thread.
//! - A task stays in flight from `start` until its outcome is dispatched, whether or not a
//!   manager still has it registered.
//! - Notifications are coalescing hints; dispatching an id with nothing queued is a no-op.

mod event_loop;
mod handle;

pub use event_loop::DeliveryLoop;
pub use handle::{DeliveryHandle, TaskId};

pub(crate) use handle::{CompletionGuard, Notifier, Pump, Pumped};
