//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and, behind the `logging` feature, the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! TaskManager ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                                       │
//!                                                       ┌───────────────┼──────────┐
//!                                                       ▼               ▼          ▼
//!                                                   LogWriter        Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
