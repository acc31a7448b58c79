//! # Event bus.
//!
//! [`Bus`] carries manager [`Event`]s from the delivery context to any number
//! of receivers. Publishing is synchronous and never waits, so it is safe to do
//! from inside listener callbacks.
//!
//! ```text
//!   TaskManager (submit, cancel, attach, detach) ──┐
//!   ListenerShadow (terminal delivery) ────────────┼──► Bus ──┬──► subscriber listener ──► SubscriberSet
//!   SubscriberSet workers (panic, overflow) ───────┘          └──► TaskManager::subscribe()
//! ```
//!
//! Receivers share one ring buffer of `capacity` slots. A receiver that falls
//! more than `capacity` events behind gets `RecvError::Lagged(n)` and resumes at
//! the oldest retained event. With no receiver, published events are discarded.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publisher/subscription point for manager events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining at most `capacity` undelivered events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver.
    pub fn publish(&self, ev: Event) {
        // `Err` only means nobody is listening right now.
        let _ = self.tx.send(ev);
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscribers_receive_later_events_only() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::TaskSubmitted));

        let mut rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        bus.publish(Event::new(EventKind::ResultDelivered).with_task("a"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ResultDelivered);
        assert_eq!(ev.task.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn slow_receiver_observes_lag() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for tag in ["a", "b", "c"] {
            bus.publish(Event::new(EventKind::TaskSubmitted).with_task(tag));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(1))));
        assert_eq!(rx.recv().await.unwrap().task.as_deref(), Some("b"));
    }
}
