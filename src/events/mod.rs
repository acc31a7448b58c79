//! Manager events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the [`TaskManager`](crate::TaskManager),
//! its registry shadow listeners and the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `TaskManager` (submit, cancel, bind), shadow listeners
//!   (terminal delivery), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: [`TaskManager::subscribe`](crate::TaskManager::subscribe) receivers
//!   and the subscriber listener spawned by the manager builder.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
