//! # Service capability interface.
//!
//! The orchestrator does not know what a module *does*; it only drives the
//! [`Service`] it produced. A service exposes its lifecycle as a
//! [`tokio::sync::watch`] channel of [`ServiceState`]; everything else
//! (`state`, `await_running`, `await_terminated`, `failure_cause`) is derived
//! from it.
//!
//! [`Instance`] is what a module factory hands back: the service as a
//! [`ServiceRef`] for lifecycle control, plus a type-erased handle so
//! dependents can recover the concrete type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::ServiceError;
use crate::services::state::{ServiceState, Termination};

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn Service>;

/// # Lifecycle-managed runtime object.
///
/// Implementors must keep the published state monotonic (see
/// [`ServiceState::can_transition_to`]) and must eventually reach
/// `Terminated` after [`stop_async`](Service::stop_async).
///
/// # Example
/// ```
/// use modvisor::{BasicService, Service, ServiceState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let svc = BasicService::new("noop", |token| async move {
///     token.cancelled().await;
///     Ok(())
/// });
/// svc.start().unwrap();
/// svc.await_running().await.unwrap();
/// svc.stop_async();
/// svc.await_terminated().await.unwrap();
/// assert!(svc.state().is_terminated());
/// # }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Requests the service to begin starting. Must not block.
    ///
    /// Fails with [`ServiceError::InvalidState`] unless the service is `Idle`.
    fn start(&self) -> Result<(), ServiceError>;

    /// Requests the service to stop. Idempotent, must not block.
    fn stop_async(&self);

    /// Subscribes to state transitions.
    fn watch_state(&self) -> watch::Receiver<ServiceState>;

    /// Current state.
    fn state(&self) -> ServiceState {
        self.watch_state().borrow().clone()
    }

    /// Failure cause, once the service terminated with one.
    fn failure_cause(&self) -> Option<ServiceError> {
        self.state().failure_cause().cloned()
    }

    /// Waits until the service is `Running`.
    ///
    /// Fails if the service moved past `Running` (or skipped it) before the
    /// wait observed it; a terminated service reports its failure cause.
    async fn await_running(&self) -> Result<(), ServiceError> {
        let mut rx = self.watch_state();
        let state = rx
            .wait_for(|s| s.rank() >= ServiceState::Running.rank())
            .await
            .map(|s| s.clone())
            .unwrap_or_else(|_| rx.borrow().clone());

        match state {
            ServiceState::Running => Ok(()),
            ServiceState::Terminated(Termination::Failed(cause)) => Err(cause),
            other => Err(ServiceError::InvalidState {
                expected: "running",
                actual: other.as_label(),
            }),
        }
    }

    /// Waits until the service is `Terminated`; returns its failure cause, if any.
    async fn await_terminated(&self) -> Result<(), ServiceError> {
        let mut rx = self.watch_state();
        let state = rx
            .wait_for(ServiceState::is_terminated)
            .await
            .map(|s| s.clone())
            .unwrap_or_else(|_| rx.borrow().clone());

        match state {
            ServiceState::Terminated(Termination::StoppedCleanly) => Ok(()),
            ServiceState::Terminated(Termination::Failed(cause)) => Err(cause),
            other => Err(ServiceError::InvalidState {
                expected: "terminated",
                actual: other.as_label(),
            }),
        }
    }
}

/// Product of a module factory.
///
/// Cloning is cheap and keeps identity: every clone points at the same service.
#[derive(Clone)]
pub struct Instance {
    service: ServiceRef,
    any: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wraps an already shared service.
    pub fn new<S: Service>(service: Arc<S>) -> Self {
        let any: Arc<dyn Any + Send + Sync> = service.clone();
        Self { service, any }
    }

    /// Wraps an owned service.
    pub fn from_service<S: Service>(service: S) -> Self {
        Self::new(Arc::new(service))
    }

    /// Lifecycle handle.
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    /// Recovers the concrete service type.
    pub fn downcast<S: Service>(&self) -> Option<Arc<S>> {
        Arc::clone(&self.any).downcast::<S>().ok()
    }

    /// True if both instances point at the same service.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("state", &self.service.state())
            .finish()
    }
}
