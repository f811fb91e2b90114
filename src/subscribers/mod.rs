//! # Event subscribers for the modvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Manager / Orchestrator ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                            │
//!                                                            ▼
//!                                                      SubscriberSet
//!                                                 ┌──────────┼──────────┐
//!                                                 ▼          ▼          ▼
//!                                             LogWriter   Metrics    Custom
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
