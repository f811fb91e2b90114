//! # Aggregate lifecycle callbacks.
//!
//! A [`ManagerListener`] is told about manager-wide transitions. Unlike a
//! [`Subscribe`](crate::Subscribe)r it runs synchronously on the manager's
//! aggregator task, in event order, and may act on the manager it is handed
//! (the cascade stop is a listener).
//!
//! Callbacks must not block. A panicking callback is caught and reported as
//! `SubscriberPanicked` on the bus.

use crate::core::manager::ServiceManager;
use crate::error::ServiceError;

/// Receives aggregate transitions from a [`ServiceManager`].
///
/// Every method has a no-op default.
pub trait ManagerListener: Send + Sync + 'static {
    /// Every service is `Running`. Called at most once.
    fn on_healthy(&self, _manager: &ServiceManager) {}

    /// Every service is `Terminated`. Called at most once.
    fn on_stopped(&self, _manager: &ServiceManager) {}

    /// One service terminated with a failure. Called once per failed service.
    fn on_service_failed(&self, _manager: &ServiceManager, _module: &str, _cause: &ServiceError) {}

    /// Name used when reporting a panic.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
