//! # Observing a run.
//!
//! A [`Subscribe`] implementation sees every [`Event`] an
//! [`Orchestrator`](crate::Orchestrator) publishes: resolution, construction,
//! service transitions, cascade decisions. It cannot influence any of them;
//! lifecycle decisions belong to a [`ManagerListener`](crate::ManagerListener).
//!
//! Delivery happens on a worker owned by [`SubscriberSet`](crate::SubscriberSet),
//! one per subscriber, behind a queue of [`Subscribe::queue_capacity`] events.
//! Falling behind only costs the slow subscriber its own events.
//!
//! ```rust
//! use async_trait::async_trait;
//! use modvisor::{Event, EventKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::CascadeTriggered) {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "alerts" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of runtime events.
///
/// `on_event` runs on the subscriber's own worker, one event at a time. A panic
/// is caught and reported as `SubscriberPanicked`; the next event is still delivered.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Name carried by `SubscriberOverflow` / `SubscriberPanicked` events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events buffered before new ones are dropped (at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
