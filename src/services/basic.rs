//! # Closure-backed service (`BasicService`)
//!
//! [`BasicService`] builds a [`Service`] out of up to three async closures:
//!
//! - `starting` (optional): runs in `Starting`; success moves the service to `Running`.
//! - `running`: the body; runs in `Running` until it returns.
//! - `stopping` (optional): runs in `Stopping`; receives the body's failure, if any.
//!
//! ## Lifecycle
//! ```text
//! start() ──► Starting ──► starting(token) ──Ok──► Running ──► running(token) ──► Stopping
//!                               │                                                  │
//!                               └──Err(e)──► Terminated(Failed(e))     stopping(failure)
//!                                                                                  ▼
//!                                                   Terminated(StoppedCleanly | Failed(e))
//! ```
//!
//! ## Rules
//! - `stop_async()` cancels the token handed to every closure; closures are expected
//!   to return promptly. Nothing is aborted forcibly.
//! - `Err(ServiceError::Canceled)` is a graceful exit, not a failure.
//! - Panics inside a closure are caught and become `ServiceError::Panicked`.
//! - Stopping an `Idle` service terminates it cleanly without running anything.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modvisor::{BasicService, ServiceError};
//!
//! let svc = BasicService::new("compactor", |token| async move {
//!     loop {
//!         tokio::select! {
//!             _ = token.cancelled() => return Ok(()),
//!             _ = tokio::time::sleep(Duration::from_secs(30)) => { /* compact */ }
//!         }
//!     }
//! })
//! .with_starting(|_token| async { Ok::<_, ServiceError>(()) });
//!
//! assert_eq!(svc.name(), "compactor");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, panic_message};
use crate::services::service::Service;
use crate::services::state::{ServiceState, Termination};

/// Boxed future returned by service closures.
pub type BoxServiceFuture = Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'static>>;

type PhaseFn = Arc<dyn Fn(CancellationToken) -> BoxServiceFuture + Send + Sync>;
type StoppingFn = Arc<dyn Fn(Option<ServiceError>) -> BoxServiceFuture + Send + Sync>;

/// Service assembled from async closures.
pub struct BasicService {
    name: Cow<'static, str>,
    starting: Option<PhaseFn>,
    running: PhaseFn,
    stopping: Option<StoppingFn>,
    state: Arc<watch::Sender<ServiceState>>,
    token: CancellationToken,
}

impl BasicService {
    /// Creates a service whose body is `running`.
    ///
    /// The closure creates a fresh future each time it is called; it is called at most once.
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, running: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        let (state, _rx) = watch::channel(ServiceState::Idle);
        Self {
            name: name.into(),
            starting: None,
            running: Arc::new(move |token| Box::pin(running(token))),
            stopping: None,
            state: Arc::new(state),
            token: CancellationToken::new(),
        }
    }

    /// Sets the hook that runs in `Starting`.
    pub fn with_starting<F, Fut>(mut self, starting: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.starting = Some(Arc::new(move |token| Box::pin(starting(token))));
        self
    }

    /// Sets the hook that runs in `Stopping`.
    pub fn with_stopping<F, Fut>(mut self, stopping: F) -> Self
    where
        F: Fn(Option<ServiceError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.stopping = Some(Arc::new(move |failure| Box::pin(stopping(failure))));
        self
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> Driver {
        Driver {
            starting: self.starting.clone(),
            running: Arc::clone(&self.running),
            stopping: self.stopping.clone(),
            state: Arc::clone(&self.state),
            token: self.token.clone(),
        }
    }
}

impl fmt::Debug for BasicService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicService")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl Service for BasicService {
    fn start(&self) -> Result<(), ServiceError> {
        let mut actual = "idle";
        let moved = self.state.send_if_modified(|s| {
            if matches!(s, ServiceState::Idle) {
                *s = ServiceState::Starting;
                true
            } else {
                actual = s.as_label();
                false
            }
        });
        if !moved {
            return Err(ServiceError::InvalidState {
                expected: "idle",
                actual,
            });
        }

        tokio::spawn(self.driver().run());
        Ok(())
    }

    fn stop_async(&self) {
        self.state.send_if_modified(|s| match s {
            ServiceState::Idle => {
                *s = ServiceState::Terminated(Termination::StoppedCleanly);
                true
            }
            ServiceState::Starting | ServiceState::Running => {
                *s = ServiceState::Stopping;
                true
            }
            _ => false,
        });
        self.token.cancel();
    }

    fn watch_state(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }
}

/// Everything the spawned lifecycle task needs.
struct Driver {
    starting: Option<PhaseFn>,
    running: PhaseFn,
    stopping: Option<StoppingFn>,
    state: Arc<watch::Sender<ServiceState>>,
    token: CancellationToken,
}

impl Driver {
    async fn run(self) {
        let termination = self.lifecycle().await;
        self.transition(ServiceState::Terminated(termination));
    }

    async fn lifecycle(&self) -> Termination {
        if let Some(starting) = &self.starting {
            if let Some(cause) = failure_of(guarded(starting(self.token.clone())).await) {
                return Termination::Failed(cause);
            }
        }

        // A stop requested while starting has already moved us to `Stopping`.
        let mut failure = None;
        if self.transition(ServiceState::Running) {
            failure = failure_of(guarded((self.running)(self.token.clone())).await);
        }
        self.transition(ServiceState::Stopping);

        if let Some(stopping) = &self.stopping {
            let stop_failure = failure_of(guarded(stopping(failure.clone())).await);
            failure = failure.or(stop_failure);
        }

        match failure {
            Some(cause) => Termination::Failed(cause),
            None => Termination::StoppedCleanly,
        }
    }

    /// Applies `next` if it keeps the lifecycle monotonic.
    fn transition(&self, next: ServiceState) -> bool {
        self.state.send_if_modified(|s| {
            if s.can_transition_to(&next) {
                *s = next;
                true
            } else {
                false
            }
        })
    }
}

/// Runs a closure future, turning a panic into `ServiceError::Panicked`.
async fn guarded(fut: BoxServiceFuture) -> Result<(), ServiceError> {
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(ServiceError::Panicked {
            info: panic_message(&*payload),
        }),
    }
}

/// `Canceled` is a graceful exit.
fn failure_of(res: Result<(), ServiceError>) -> Option<ServiceError> {
    match res {
        Ok(()) | Err(ServiceError::Canceled) => None,
        Err(e) => Some(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn until_cancelled(name: &'static str) -> BasicService {
        BasicService::new(name, |token: CancellationToken| async move {
            token.cancelled().await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_start_run_stop_cleanly() {
        let svc = until_cancelled("svc");
        assert_eq!(svc.state(), ServiceState::Idle);

        svc.start().unwrap();
        timeout(WAIT, svc.await_running()).await.unwrap().unwrap();

        svc.stop_async();
        timeout(WAIT, svc.await_terminated()).await.unwrap().unwrap();
        assert_eq!(svc.state(), ServiceState::Terminated(Termination::StoppedCleanly));
        assert_eq!(svc.failure_cause(), None);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let svc = until_cancelled("svc");
        svc.start().unwrap();
        let err = svc.start().unwrap_err();
        assert_eq!(
            err,
            ServiceError::InvalidState {
                expected: "idle",
                actual: "starting"
            }
        );
        svc.stop_async();
    }

    #[tokio::test]
    async fn test_body_failure_is_recorded() {
        let svc = BasicService::new("disk", |_token| async {
            Err(ServiceError::fail("disk full"))
        });
        svc.start().unwrap();

        let err = timeout(WAIT, svc.await_terminated()).await.unwrap().unwrap_err();
        assert_eq!(err, ServiceError::fail("disk full"));
        assert_eq!(svc.failure_cause(), Some(ServiceError::fail("disk full")));
    }

    #[tokio::test]
    async fn test_starting_failure_skips_body_and_stopping() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_body = Arc::clone(&ran);
        let ran_stop = Arc::clone(&ran);

        let svc = BasicService::new("svc", move |_token| {
            let ran = Arc::clone(&ran_body);
            async move {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .with_starting(|_token| async { Err(ServiceError::fatal("bad config")) })
        .with_stopping(move |_failure| {
            let ran = Arc::clone(&ran_stop);
            async move {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        svc.start().unwrap();
        let err = timeout(WAIT, svc.await_running()).await.unwrap().unwrap_err();
        assert_eq!(err, ServiceError::fatal("bad config"));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stopping_hook_sees_body_failure() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen_hook = Arc::clone(&seen);

        let svc = BasicService::new("svc", |_token| async { Err(ServiceError::fail("boom")) })
            .with_stopping(move |failure| {
                let seen = Arc::clone(&seen_hook);
                async move {
                    *seen.lock() = failure;
                    Ok(())
                }
            });

        svc.start().unwrap();
        let _ = timeout(WAIT, svc.await_terminated()).await.unwrap();
        assert_eq!(*seen.lock(), Some(ServiceError::fail("boom")));
    }

    #[tokio::test]
    async fn test_stop_before_start_terminates_cleanly() {
        let svc = until_cancelled("svc");
        svc.stop_async();
        assert_eq!(svc.state(), ServiceState::Terminated(Termination::StoppedCleanly));
        assert!(svc.start().is_err());
    }

    #[tokio::test]
    async fn test_canceled_is_graceful_and_panic_is_captured() {
        let canceled = BasicService::new("c", |token: CancellationToken| async move {
            token.cancelled().await;
            Err(ServiceError::Canceled)
        });
        canceled.start().unwrap();
        timeout(WAIT, canceled.await_running()).await.unwrap().unwrap();
        canceled.stop_async();
        timeout(WAIT, canceled.await_terminated()).await.unwrap().unwrap();

        let panicky = BasicService::new("p", |_token| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        panicky.start().unwrap();
        let err = timeout(WAIT, panicky.await_terminated()).await.unwrap().unwrap_err();
        assert_eq!(
            err,
            ServiceError::Panicked {
                info: "kaboom".into()
            }
        );
    }

    #[tokio::test]
    async fn test_natural_completion_is_clean() {
        let svc = BasicService::new("oneshot", |_token| async { Ok(()) });
        svc.start().unwrap();
        timeout(WAIT, svc.await_terminated()).await.unwrap().unwrap();
    }

    #[test]
    fn test_debug_shows_name_and_state() {
        let svc = until_cancelled("ingester");
        let dbg = format!("{svc:?}");
        assert!(dbg.contains("ingester"), "{dbg}");
        assert!(dbg.contains("Idle"), "{dbg}");
    }
}
