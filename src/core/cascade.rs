//! # Fail-fast cascade.
//!
//! [`CascadeController`] is the [`ManagerListener`] that turns one failed
//! service into a stop of all of them:
//!
//! ```text
//! on_service_failed(module, cause)
//!     ├─► manager.stop_all()                  (idempotent)
//!     └─► manager.record_failure(module, cause)
//!             ├─ first + StopProcess ──► StopProcessRequested  (run ends clean)
//!             ├─ first               ──► CascadeTriggered      (run ends with module + cause)
//!             └─ later               ──► CascadeFailureIgnored (origin kept)
//! ```

use crate::core::listener::ManagerListener;
use crate::core::manager::ServiceManager;
use crate::error::ServiceError;
use crate::events::{Event, EventKind};

/// Stops every service as soon as one fails and remembers who failed first.
#[derive(Clone, Copy, Debug, Default)]
pub struct CascadeController;

impl CascadeController {
    pub fn new() -> Self {
        Self
    }
}

impl ManagerListener for CascadeController {
    fn on_service_failed(&self, manager: &ServiceManager, module: &str, cause: &ServiceError) {
        manager.stop_all();

        let kind = if !manager.record_failure(module, cause.clone()) {
            EventKind::CascadeFailureIgnored
        } else if cause.is_stop_request() {
            EventKind::StopProcessRequested
        } else {
            EventKind::CascadeTriggered
        };
        manager.bus().publish(
            Event::new(kind)
                .with_module(module)
                .with_reason(cause.as_message()),
        );
    }

    fn name(&self) -> &'static str {
        "cascade"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manager::RunOutcome;
    use crate::events::Bus;
    use crate::services::{BasicService, ServiceRef, ServiceState, Termination};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn waiting(name: &'static str) -> ServiceRef {
        Arc::new(BasicService::new(name, |token| async move {
            token.cancelled().await;
            Ok(())
        }))
    }

    fn ending_with(name: &'static str, delay: Duration, err: ServiceError) -> ServiceRef {
        Arc::new(BasicService::new(name, move |token| {
            let err = err.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => Ok(()),
                    _ = tokio::time::sleep(delay) => Err(err),
                }
            }
        }))
    }

    fn manager(b: ServiceRef, bus: Bus) -> ServiceManager {
        let m = ServiceManager::new(
            vec![
                ("A", waiting("A")),
                ("B", b),
                ("C", waiting("C")),
                ("D", waiting("D")),
            ],
            bus,
        );
        m.add_listener(Arc::new(CascadeController::new()));
        m
    }

    #[tokio::test]
    async fn test_failure_stops_every_peer() {
        let bus = Bus::new(128);
        let mut rx = bus.subscribe();
        let m = manager(
            ending_with("B", Duration::from_millis(20), ServiceError::fail("disk full")),
            bus,
        );
        m.start_all().unwrap();

        let outcome = timeout(Duration::from_secs(2), m.await_stopped())
            .await
            .expect("cascade stops everything");
        assert_eq!(
            outcome,
            RunOutcome::Failure {
                module: "B".into(),
                cause: ServiceError::fail("disk full"),
            }
        );
        for (module, state) in m.states() {
            assert!(state.is_terminated(), "{module} is {state:?}");
            if module != "B" {
                assert_eq!(state.failure_cause(), None, "{module}");
            }
        }

        let mut triggered = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::CascadeTriggered {
                triggered = ev.module.clone();
            }
        }
        assert_eq!(triggered.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_stop_sentinel_ends_clean() {
        let bus = Bus::new(128);
        let mut rx = bus.subscribe();
        let m = manager(
            ending_with("B", Duration::from_millis(20), ServiceError::StopProcess),
            bus,
        );
        m.start_all().unwrap();

        let outcome = timeout(Duration::from_secs(2), m.await_stopped())
            .await
            .expect("sentinel stops everything");
        assert_eq!(outcome, RunOutcome::Success);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::StopProcessRequested), "{kinds:?}");
        assert!(!kinds.contains(&EventKind::CascadeTriggered), "{kinds:?}");
    }

    #[tokio::test]
    async fn test_later_failures_keep_origin() {
        let bus = Bus::new(128);
        let mut rx = bus.subscribe();
        let stubborn: ServiceRef = Arc::new(
            BasicService::new("C", |token| async move {
                token.cancelled().await;
                Ok(())
            })
            .with_stopping(|_| async { Err(ServiceError::fail("flush failed")) }),
        );
        let m = ServiceManager::new(
            vec![
                ("B", ending_with("B", Duration::from_millis(20), ServiceError::fail("disk full"))),
                ("C", stubborn),
            ],
            bus,
        );
        m.add_listener(Arc::new(CascadeController::new()));
        m.start_all().unwrap();

        let outcome = timeout(Duration::from_secs(2), m.await_stopped())
            .await
            .expect("stopped in time");
        assert_eq!(
            outcome,
            RunOutcome::Failure {
                module: "B".into(),
                cause: ServiceError::fail("disk full"),
            }
        );
        assert_eq!(
            m.states()[1].1,
            ServiceState::Terminated(Termination::Failed(ServiceError::fail("flush failed")))
        );

        let mut ignored = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::CascadeFailureIgnored {
                ignored.push(ev.module.clone());
            }
        }
        assert_eq!(ignored, vec![Some(Arc::<str>::from("C"))]);
    }

    #[tokio::test]
    async fn test_failure_before_healthy_still_cascades() {
        let failing: ServiceRef = Arc::new(
            BasicService::new("B", |token| async move {
                token.cancelled().await;
                Ok(())
            })
            .with_starting(|_| async { Err(ServiceError::fatal("bad config")) }),
        );
        let m = manager(failing, Bus::new(128));
        m.start_all().unwrap();

        let outcome = timeout(Duration::from_secs(2), m.await_stopped())
            .await
            .expect("stopped in time");
        match outcome {
            RunOutcome::Failure { module, cause } => {
                assert_eq!(module, "B");
                assert_eq!(cause, ServiceError::fatal("bad config"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(m.pending().is_empty());
        assert!(m.states().iter().all(|(_, s)| s.is_terminated()));
    }
}
