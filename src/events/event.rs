//! # Runtime events emitted by the orchestrator and the service manager.
//!
//! Kinds fall into four groups: resolving and building the target, one
//! service changing state, the run as a whole (health, cascade, shutdown) and
//! trouble delivering events to subscribers. `seq` increases with every
//! publication on one bus.
//!
//! ```rust
//! use modvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ServiceFailed)
//!     .with_module("ingester")
//!     .with_reason("disk full");
//!
//! assert_eq!(ev.kind, EventKind::ServiceFailed);
//! assert_eq!(ev.module.as_deref(), Some("ingester"));
//! assert_eq!(ev.reason.as_deref(), Some("disk full"));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// What an [`Event`] reports.
///
/// Field notes list which of `module` / `reason` a kind fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // resolution
    /// Target is an internal module; the run continues. `module`: target.
    TargetInternal,
    /// Target resolved. `module`: target, `reason`: construction order, `", "`-joined.
    TargetResolved,
    /// Factory returned a service. `module`.
    ModuleConstructed,
    /// No factory, or the factory returned nothing. `module`.
    ModuleStructural,

    // per service; `module` is the owning module
    ServiceStarting,
    ServiceRunning,
    ServiceStopping,
    /// Terminated without a cause.
    ServiceStopped,
    /// Terminated with a cause. `reason`: the cause.
    ServiceFailed,

    // whole run
    /// Every service is `Running`.
    ManagerHealthy,
    /// Every service is `Terminated`. On a failed run `module` / `reason`
    /// name the origin.
    ManagerStopped,
    /// Termination signal (or `run_until` future) fired.
    ShutdownRequested,
    /// First failure; all services are being stopped. `module`, `reason`.
    CascadeTriggered,
    /// A service ended with the stop sentinel. `module`.
    StopProcessRequested,
    /// A failure after the origin was recorded. `module`, `reason`.
    CascadeFailureIgnored,
    /// Everything terminated before the grace deadline. `grace_ms`.
    AllStoppedWithin,
    /// Grace deadline passed. `grace_ms`, `reason`: modules still running.
    GraceExceeded,

    // subscriber delivery; `module` is the subscriber name
    /// `on_event` panicked. `reason`: panic message.
    SubscriberPanicked,
    /// An event was dropped for one subscriber. `reason`: `full` or `closed`.
    SubscriberOverflow,
}

/// One runtime occurrence, stamped by the [`Bus`](crate::events::Bus) that carried it.
#[derive(Clone, Debug)]
pub struct Event {
    /// Position in the bus's publication order; 0 until published.
    pub seq: u64,
    pub at: SystemTime,
    pub kind: EventKind,
    /// Module (or subscriber) concerned.
    pub module: Option<Arc<str>>,
    /// Free-form detail: a failure cause, an order, a list of names.
    pub reason: Option<Arc<str>>,
    /// Shutdown grace in milliseconds, saturating at `u32::MAX`.
    pub grace_ms: Option<u32>,
}

impl Event {
    /// Unpublished event of `kind`, timestamped now.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            module: None,
            reason: None,
            grace_ms: None,
        }
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    #[inline]
    pub fn with_grace(mut self, d: Duration) -> Self {
        self.grace_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, why: &'static str) -> Self {
        Self::new(EventKind::SubscriberOverflow)
            .with_module(subscriber)
            .with_reason(why)
    }

    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, message: String) -> Self {
        Self::new(EventKind::SubscriberPanicked)
            .with_module(subscriber)
            .with_reason(message)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
