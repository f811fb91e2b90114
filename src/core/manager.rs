//! # Service manager: one lifecycle for a set of services.
//!
//! [`ServiceManager`] starts, stops and observes every service produced for a
//! target and derives the aggregate state from theirs:
//!
//! - **Healthy**: every service is currently `Running`;
//! - **Stopped**: every service is `Terminated`.
//!
//! ## Architecture
//! ```text
//! service[0].watch_state() ──► watcher 0 ──┐
//! service[1].watch_state() ──► watcher 1 ──┼──► (idx, state) ──► aggregator ──► listeners (in order)
//! service[N].watch_state() ──► watcher N ──┘     unbounded          │
//!                                                                   ├──► Bus: Service*/Manager* events
//!                                                                   └──► outcome (watch) ──► await_stopped()
//! ```
//!
//! The aggregator task owns the per-service bookkeeping; nothing else mutates
//! it. It is spawned by the first `start_all` or `stop_all` call, so listeners
//! registered before that never miss a transition.
//!
//! ## Rules
//! - `on_healthy` and `on_stopped` fire at most once, `on_service_failed` once per failed service.
//! - `stop_all` is idempotent; the first caller wins and gets `true`.
//! - After a stop was requested `start_all` starts nothing.
//! - The first recorded failure wins; the stop sentinel counts as a clean stop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::listener::ManagerListener;
use crate::error::{RuntimeError, ServiceError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::services::{ServiceRef, ServiceState, Termination};

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every service stopped without a recorded failure (or on the stop sentinel).
    Success,
    /// A service failed and the rest were stopped because of it.
    Failure {
        /// Module whose failure was recorded first.
        module: String,
        /// Its failure cause.
        cause: ServiceError,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    /// `Ok(())` on success, [`RuntimeError::ServiceFailed`] otherwise.
    pub fn into_result(self) -> Result<(), RuntimeError> {
        match self {
            RunOutcome::Success => Ok(()),
            RunOutcome::Failure { module, cause } => {
                Err(RuntimeError::ServiceFailed { module, cause })
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Stopping,
}

struct ManagedService {
    module: Arc<str>,
    service: ServiceRef,
}

struct Inner {
    services: Vec<ManagedService>,
    bus: Bus,
    listeners: Mutex<Vec<Arc<dyn ManagerListener>>>,
    phase: Mutex<Phase>,
    failure: Mutex<Option<(Arc<str>, ServiceError)>>,
    stop_token: CancellationToken,
    stopped: watch::Sender<Option<RunOutcome>>,
    spawned: AtomicBool,
}

/// Aggregates the lifecycles of a set of services.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct ServiceManager {
    inner: Arc<Inner>,
}

impl ServiceManager {
    /// Creates a manager over `(module, service)` pairs. Every service must be `Idle`.
    pub fn new<I, M>(services: I, bus: Bus) -> Self
    where
        I: IntoIterator<Item = (M, ServiceRef)>,
        M: Into<Arc<str>>,
    {
        let services = services
            .into_iter()
            .map(|(module, service)| ManagedService {
                module: module.into(),
                service,
            })
            .collect();
        let (stopped, _rx) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                services,
                bus,
                listeners: Mutex::new(Vec::new()),
                phase: Mutex::new(Phase::Idle),
                failure: Mutex::new(None),
                stop_token: CancellationToken::new(),
                stopped,
                spawned: AtomicBool::new(false),
            }),
        }
    }

    /// Registers a listener. Register before `start_all` to see every transition.
    pub fn add_listener(&self, listener: Arc<dyn ManagerListener>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Requests every service to start. Does not wait for readiness.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// [`RuntimeError::ManagerStart`] if a service refuses to start; every
    /// service is then asked to stop.
    pub fn start_all(&self) -> Result<(), RuntimeError> {
        let mut phase = self.inner.phase.lock();
        if *phase == Phase::Stopping {
            return Ok(());
        }
        *phase = Phase::Started;
        self.ensure_aggregator();

        for svc in &self.inner.services {
            if let Err(source) = svc.service.start() {
                *phase = Phase::Stopping;
                drop(phase);
                self.halt();
                return Err(RuntimeError::ManagerStart {
                    module: svc.module.to_string(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Requests every service to stop. Non-blocking and idempotent.
    ///
    /// Returns `true` only for the call that initiated the stop.
    /// Must be called from within a tokio runtime.
    pub fn stop_all(&self) -> bool {
        {
            let mut phase = self.inner.phase.lock();
            if *phase == Phase::Stopping {
                return false;
            }
            *phase = Phase::Stopping;
        }
        self.ensure_aggregator();
        self.halt();
        true
    }

    /// True once a stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.inner.stop_token.is_cancelled()
    }

    /// Completes once a stop has been requested.
    pub async fn stop_requested(&self) {
        self.inner.stop_token.cancelled().await;
    }

    /// Waits until every service terminated and returns the outcome.
    ///
    /// Never completes if neither `start_all` nor `stop_all` was called.
    pub async fn await_stopped(&self) -> RunOutcome {
        let mut rx = self.inner.stopped.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|v| v.clone());
        outcome.unwrap_or_else(|| self.outcome())
    }

    /// Records the failure that caused the run to stop.
    ///
    /// Returns `false` if a failure was already recorded; the first one wins.
    pub fn record_failure(&self, module: &str, cause: ServiceError) -> bool {
        let mut failure = self.inner.failure.lock();
        if failure.is_some() {
            return false;
        }
        *failure = Some((Arc::from(module), cause));
        true
    }

    /// Outcome as of now, from the recorded failure.
    pub fn outcome(&self) -> RunOutcome {
        match &*self.inner.failure.lock() {
            Some((module, cause)) if !cause.is_stop_request() => RunOutcome::Failure {
                module: module.to_string(),
                cause: cause.clone(),
            },
            _ => RunOutcome::Success,
        }
    }

    /// Current state of every service, in registration order.
    pub fn states(&self) -> Vec<(String, ServiceState)> {
        self.inner
            .services
            .iter()
            .map(|s| (s.module.to_string(), s.service.state()))
            .collect()
    }

    /// Modules whose services have not terminated yet.
    pub fn pending(&self) -> Vec<String> {
        self.inner
            .services
            .iter()
            .filter(|s| !s.service.state().is_terminated())
            .map(|s| s.module.to_string())
            .collect()
    }

    /// Modules managed, in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.inner.services.iter().map(|s| &*s.module)
    }

    pub fn len(&self) -> usize {
        self.inner.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.services.is_empty()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    fn halt(&self) {
        self.inner.stop_token.cancel();
        for svc in &self.inner.services {
            svc.service.stop_async();
        }
    }

    fn ensure_aggregator(&self) {
        if self.inner.spawned.swap(true, Ordering::AcqRel) {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        for (idx, svc) in self.inner.services.iter().enumerate() {
            let states = svc.service.watch_state();
            tokio::spawn(watch_service(idx, states, tx.clone()));
        }
        drop(tx);
        tokio::spawn(aggregate(self.clone(), rx));
    }

    fn notify<F>(&self, f: F)
    where
        F: Fn(&dyn ManagerListener),
    {
        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))) {
                self.inner.bus.publish(Event::subscriber_panicked(
                    listener.name(),
                    panic_message(&*payload),
                ));
            }
        }
    }
}

/// Forwards every observed transition of one service; exits once it terminated.
async fn watch_service(
    idx: usize,
    mut states: watch::Receiver<ServiceState>,
    tx: mpsc::UnboundedSender<(usize, ServiceState)>,
) {
    let mut last = states.borrow_and_update().clone();
    if tx.send((idx, last.clone())).is_err() {
        return;
    }
    while !last.is_terminated() {
        if states.changed().await.is_err() {
            return;
        }
        let next = states.borrow_and_update().clone();
        if next == last {
            continue;
        }
        if tx.send((idx, next.clone())).is_err() {
            return;
        }
        last = next;
    }
}

async fn aggregate(manager: ServiceManager, mut rx: mpsc::UnboundedReceiver<(usize, ServiceState)>) {
    let inner = &manager.inner;
    let mut states = vec![ServiceState::Idle; inner.services.len()];
    let mut healthy = false;

    if !states.is_empty() {
        while let Some((idx, state)) = rx.recv().await {
            let module = &inner.services[idx].module;
            if let Some(ev) = state_event(&state) {
                inner.bus.publish(ev.with_module(Arc::clone(module)));
            }
            if let ServiceState::Terminated(Termination::Failed(cause)) = &state {
                manager.notify(|l| l.on_service_failed(&manager, module, cause));
            }
            states[idx] = state;

            if !healthy && states.iter().all(ServiceState::is_running) {
                healthy = true;
                inner.bus.publish(Event::new(EventKind::ManagerHealthy));
                manager.notify(|l| l.on_healthy(&manager));
            }
            if states.iter().all(ServiceState::is_terminated) {
                break;
            }
        }
        if !states.iter().all(ServiceState::is_terminated) {
            return;
        }
    }

    let outcome = manager.outcome();
    let mut ev = Event::new(EventKind::ManagerStopped);
    if let RunOutcome::Failure { module, cause } = &outcome {
        ev = ev.with_module(module.as_str()).with_reason(cause.as_message());
    }
    inner.bus.publish(ev);
    manager.notify(|l| l.on_stopped(&manager));
    inner.stopped.send_replace(Some(outcome));
}

fn state_event(state: &ServiceState) -> Option<Event> {
    let ev = match state {
        ServiceState::Idle => return None,
        ServiceState::Starting => Event::new(EventKind::ServiceStarting),
        ServiceState::Running => Event::new(EventKind::ServiceRunning),
        ServiceState::Stopping => Event::new(EventKind::ServiceStopping),
        ServiceState::Terminated(Termination::StoppedCleanly) => {
            Event::new(EventKind::ServiceStopped)
        }
        ServiceState::Terminated(Termination::Failed(cause)) => {
            Event::new(EventKind::ServiceFailed).with_reason(cause.as_message())
        }
    };
    Some(ev)
}
