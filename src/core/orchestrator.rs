//! # Orchestrator: one target, one run.
//!
//! The [`Orchestrator`] owns the module registry, the event bus and the
//! subscriber set. A run turns the configured target into running services and
//! keeps them up until they stop together.
//!
//! ## High-level architecture
//! ```text
//! run() / run_until(shutdown)
//!   │
//!   ├─ registry.get(target)        ── UnknownModule
//!   │     └─ internal? ──► Bus: TargetInternal (warning only)
//!   ├─ registry.resolve(target)    ── CyclicDependency / UnknownModule
//!   │     └─► Bus: TargetResolved
//!   ├─ ModuleConstructor::construct ── Construction / NoServices
//!   ├─ ServiceManager::new(services) + CascadeController
//!   ├─ manager.start_all()         ── ManagerStart
//!   └─ supervise:
//!        select {
//!          await_stopped()    ──► outcome
//!          shutdown           ──► Bus: ShutdownRequested, record StopProcess, stop_all(), wait_all_with_grace()
//!          stop_requested()   ──► wait_all_with_grace()   (cascade already stopping)
//!        }
//!
//! Event flow:
//!   constructor / manager / cascade ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//! ```
//!
//! On return the listener drains what is left on the bus and the subscriber set
//! is shut down, so every event of the run has been delivered.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::core::builder::OrchestratorBuilder;
use crate::core::cascade::CascadeController;
use crate::core::config::OrchestratorConfig;
use crate::core::manager::{RunOutcome, ServiceManager};
use crate::core::shutdown;
use crate::error::{RuntimeError, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::modules::{ModuleConstructor, ModuleRegistry};
use crate::subscribers::SubscriberSet;

/// Runs a target of a [`ModuleRegistry`].
pub struct Orchestrator {
    cfg: OrchestratorConfig,
    registry: Arc<ModuleRegistry>,
    bus: Bus,
    subs: SubscriberSet,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    pub fn builder(registry: impl Into<Arc<ModuleRegistry>>, cfg: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(registry.into(), cfg)
    }

    pub(crate) fn new_internal(
        cfg: OrchestratorConfig,
        registry: Arc<ModuleRegistry>,
        bus: Bus,
        subs: SubscriberSet,
    ) -> Self {
        Self {
            cfg,
            registry,
            bus,
            subs,
        }
    }

    /// Event bus of this orchestrator; subscribe before `run` to see every event.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Runs the target until it stops, reacting to OS termination signals
    /// when [`OrchestratorConfig::handle_os_signals`] is set.
    ///
    /// Returns `Ok(())` on a clean stop and [`RuntimeError::ServiceFailed`]
    /// naming the first failed module otherwise.
    pub async fn run(self) -> Result<(), RuntimeError> {
        if self.cfg.handle_os_signals {
            self.run_until(shutdown::os_shutdown()).await
        } else {
            self.run_until(std::future::pending::<()>()).await
        }
    }

    /// Like [`run`](Self::run), stopping every service once `shutdown` completes.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            cfg,
            registry,
            bus,
            subs,
        } = self;

        let done = CancellationToken::new();
        let listener = tokio::spawn(subscriber_listener(bus.subscribe(), subs, done.clone()));

        let run = Run {
            cfg: &cfg,
            registry: &registry,
            bus: &bus,
        };
        let res = run.execute(shutdown).await;

        done.cancel();
        if let Ok(subs) = listener.await {
            subs.shutdown().await;
        }
        res
    }
}

/// Forwards bus events to the subscriber set until `done`, then drains the bus.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    done: CancellationToken,
) -> SubscriberSet {
    loop {
        tokio::select! {
            biased;
            res = rx.recv() => match res {
                Ok(ev) => subs.emit(&ev),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return subs,
            },
            _ = done.cancelled() => break,
        }
    }
    loop {
        match rx.try_recv() {
            Ok(ev) => subs.emit(&ev),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return subs,
        }
    }
}

struct Run<'a> {
    cfg: &'a OrchestratorConfig,
    registry: &'a ModuleRegistry,
    bus: &'a Bus,
}

impl Run<'_> {
    async fn execute<F>(&self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let manager = self.prepare()?;
        manager.add_listener(Arc::new(CascadeController::new()));
        manager.start_all()?;

        let outcome = self.supervise(&manager, shutdown).await?;
        outcome.into_result()
    }

    /// Everything up to a ready-to-start manager; no service runs yet.
    fn prepare(&self) -> Result<ServiceManager, RuntimeError> {
        let target = self.cfg.target.as_str();
        let descriptor = self
            .registry
            .get(target)
            .ok_or_else(|| RuntimeError::UnknownModule {
                module: target.to_string(),
                referenced_by: None,
            })?;
        if !descriptor.is_user_visible() {
            self.bus.publish(
                Event::new(EventKind::TargetInternal)
                    .with_module(target)
                    .with_reason("selected target is an internal module"),
            );
        }

        let resolution = self.registry.resolve(target)?;
        self.bus.publish(
            Event::new(EventKind::TargetResolved)
                .with_module(target)
                .with_reason(resolution.order().join(", ")),
        );

        let services = ModuleConstructor::new(self.registry)
            .with_bus(self.bus.clone())
            .construct_resolved(&resolution)?;
        if services.is_empty() {
            return Err(RuntimeError::NoServices {
                target: target.to_string(),
            });
        }
        Ok(ServiceManager::new(services.services(), self.bus.clone()))
    }

    async fn supervise<F>(&self, manager: &ServiceManager, shutdown: F) -> Result<RunOutcome, RuntimeError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            outcome = manager.await_stopped() => Ok(outcome),
            _ = shutdown => {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                // An operator stop is clean; failures while stopping do not become the origin.
                manager.record_failure(&self.cfg.target, ServiceError::StopProcess);
                manager.stop_all();
                self.wait_all_with_grace(manager).await
            }
            _ = manager.stop_requested() => self.wait_all_with_grace(manager).await,
        }
    }

    /// Waits for every service to terminate, at most the configured grace.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the modules still running.
    async fn wait_all_with_grace(&self, manager: &ServiceManager) -> Result<RunOutcome, RuntimeError> {
        let Some(grace) = self.cfg.shutdown_grace() else {
            let outcome = manager.await_stopped().await;
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(outcome);
        };

        match tokio::time::timeout(grace, manager.await_stopped()).await {
            Ok(outcome) => {
                self.bus
                    .publish(Event::new(EventKind::AllStoppedWithin).with_grace(grace));
                Ok(outcome)
            }
            Err(_) => {
                let stuck = manager.pending();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_grace(grace)
                        .with_reason(stuck.join(", ")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleDescriptor;
    use crate::services::{BasicService, Instance, Service, ServiceState};
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{oneshot, watch};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn waiting(name: &'static str) -> Instance {
        Instance::from_service(BasicService::new(name, |token| async move {
            token.cancelled().await;
            Ok(())
        }))
    }

    fn module(name: &'static str, deps: &[&'static str]) -> ModuleDescriptor {
        ModuleDescriptor::new(name)
            .depends_on(deps.iter().copied())
            .with_factory(move |_, _| Ok(Some(waiting(name))))
    }

    fn abcd(b: ModuleDescriptor) -> ModuleRegistry {
        ModuleRegistry::builder()
            .register(module("A", &[]))
            .register(b)
            .register(module("C", &["A"]))
            .register(module("D", &["B", "C"]))
            .build()
            .unwrap()
    }

    fn cfg(target: &str) -> OrchestratorConfig {
        OrchestratorConfig {
            handle_os_signals: false,
            ..OrchestratorConfig::for_target(target)
        }
    }

    struct Recorder {
        seen: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().push(ev.clone());
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn kinds(&self) -> Vec<EventKind> {
            self.seen.lock().iter().map(|e| e.kind).collect()
        }
    }

    #[tokio::test]
    async fn test_signal_stops_cleanly_after_healthy() {
        let registry = abcd(module("B", &["A"]));
        let rec = Recorder::new();
        let orch = Orchestrator::builder(registry, cfg("D"))
            .with_subscribers(vec![rec.clone()])
            .build();

        let mut events = orch.bus().subscribe();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(orch.run_until(async {
            let _ = rx.await;
        }));

        timeout(WAIT, async {
            loop {
                if events.recv().await.unwrap().kind == EventKind::ManagerHealthy {
                    break;
                }
            }
        })
        .await
        .expect("healthy in time");

        tx.send(()).unwrap();
        let res = timeout(WAIT, handle).await.expect("run returns").unwrap();
        assert!(res.is_ok(), "{res:?}");

        let kinds = rec.kinds();
        assert!(kinds.contains(&EventKind::TargetResolved), "{kinds:?}");
        assert!(kinds.contains(&EventKind::ShutdownRequested), "{kinds:?}");
        assert!(kinds.contains(&EventKind::ManagerStopped), "{kinds:?}");
        assert!(!kinds.contains(&EventKind::TargetInternal), "{kinds:?}");
        let resolved = rec
            .seen
            .lock()
            .iter()
            .find(|e| e.kind == EventKind::TargetResolved)
            .and_then(|e| e.reason.clone());
        assert_eq!(resolved.as_deref(), Some("A, B, C, D"));
    }

    #[tokio::test]
    async fn test_failure_while_shutting_down_stays_clean() {
        let flaky = ModuleDescriptor::new("A").with_factory(|_, _| {
            let svc = BasicService::new("A", |token| async move {
                token.cancelled().await;
                Ok(())
            })
            .with_stopping(|_| async { Err::<(), _>(ServiceError::fail("flush on shutdown")) });
            Ok(Some(Instance::from_service(svc)))
        });
        let registry = ModuleRegistry::builder().register(flaky).build().unwrap();
        let rec = Recorder::new();
        let orch = Orchestrator::builder(registry, cfg("A"))
            .with_subscribers(vec![rec.clone()])
            .build();

        let mut events = orch.bus().subscribe();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(orch.run_until(async {
            let _ = rx.await;
        }));
        timeout(WAIT, async {
            while events.recv().await.unwrap().kind != EventKind::ManagerHealthy {}
        })
        .await
        .expect("healthy in time");

        tx.send(()).unwrap();
        let res = timeout(WAIT, handle).await.expect("run returns").unwrap();
        assert!(res.is_ok(), "{res:?}");

        let kinds = rec.kinds();
        assert!(kinds.contains(&EventKind::ServiceFailed), "{kinds:?}");
        assert!(kinds.contains(&EventKind::CascadeFailureIgnored), "{kinds:?}");
        assert!(!kinds.contains(&EventKind::CascadeTriggered), "{kinds:?}");
    }

    #[tokio::test]
    async fn test_failure_cascades_and_names_module() {
        let failing = ModuleDescriptor::new("B")
            .depends_on(["A"])
            .with_factory(|_, _| {
                Ok(Some(Instance::from_service(BasicService::new(
                    "B",
                    |token| async move {
                        tokio::select! {
                            _ = token.cancelled() => Ok(()),
                            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                                Err(ServiceError::fail("disk full"))
                            }
                        }
                    },
                ))))
            });
        let orch = Orchestrator::builder(abcd(failing), cfg("D")).build();

        let err = timeout(WAIT, orch.run_until(std::future::pending::<()>()))
            .await
            .expect("run returns")
            .unwrap_err();
        match &err {
            RuntimeError::ServiceFailed { module, cause } => {
                assert_eq!(module, "B");
                assert_eq!(cause, &ServiceError::fail("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("B"));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_dependents_see_running_dependencies() {
        let (seen_tx, mut seen_rx) = watch::channel(false);
        let seen_tx = Arc::new(seen_tx);
        let registry = ModuleRegistry::builder()
            .register(module("store", &[]).internal())
            .register(
                ModuleDescriptor::new("querier")
                    .depends_on(["store"])
                    .with_factory(move |_, deps| {
                        let store = deps.require::<BasicService>("store")?;
                        let seen_tx = seen_tx.clone();
                        Ok(Some(Instance::from_service(BasicService::new(
                            "querier",
                            move |token| {
                                let store = store.clone();
                                let seen_tx = seen_tx.clone();
                                async move {
                                    store.await_running().await?;
                                    seen_tx.send_replace(true);
                                    token.cancelled().await;
                                    Ok(())
                                }
                            },
                        ))))
                    }),
            )
            .build()
            .unwrap();

        let orch = Orchestrator::builder(registry, cfg("querier")).build();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(orch.run_until(async {
            let _ = rx.await;
        }));

        timeout(WAIT, seen_rx.wait_for(|v| *v))
            .await
            .expect("querier saw store running")
            .unwrap();
        tx.send(()).unwrap();
        timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_sentinel_exits_cleanly() {
        let registry = ModuleRegistry::builder()
            .register(module("A", &[]))
            .register(
                ModuleDescriptor::new("B").with_factory(|_, _| {
                    Ok(Some(Instance::from_service(BasicService::new("B", |_token| async {
                        Err(ServiceError::StopProcess)
                    }))))
                }),
            )
            .register(ModuleDescriptor::new("all").depends_on(["A", "B"]))
            .build()
            .unwrap();

        let res = timeout(
            WAIT,
            Orchestrator::builder(registry, cfg("all"))
                .build()
                .run_until(std::future::pending::<()>()),
        )
        .await
        .expect("run returns");
        assert!(res.is_ok(), "{res:?}");
    }

    #[tokio::test]
    async fn test_resolution_errors_start_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            move |name: &'static str| {
                let calls = calls.clone();
                ModuleDescriptor::new(name).with_factory(move |_, _| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(waiting(name)))
                })
            }
        };
        let registry = ModuleRegistry::builder()
            .register(counted("a").depends_on(["b"]))
            .register(counted("b").depends_on(["a"]))
            .build()
            .unwrap();
        let registry = Arc::new(registry);

        let err = Orchestrator::builder(registry.clone(), cfg("a"))
            .build()
            .run_until(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CyclicDependency { .. }));

        let err = Orchestrator::builder(registry, cfg("nope"))
            .build()
            .run_until(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownModule { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_structural_only_target_is_rejected() {
        let registry = ModuleRegistry::builder()
            .register(ModuleDescriptor::new("ring"))
            .register(ModuleDescriptor::new("all").depends_on(["ring"]))
            .build()
            .unwrap();
        let err = Orchestrator::builder(registry, cfg("all"))
            .build()
            .run_until(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoServices { ref target } if target == "all"));
    }

    #[tokio::test]
    async fn test_internal_target_warns_but_runs() {
        let registry = ModuleRegistry::builder()
            .register(module("store", &[]).internal())
            .build()
            .unwrap();
        let rec = Recorder::new();
        let res = Orchestrator::builder(registry, cfg("store"))
            .with_subscribers(vec![rec.clone()])
            .build()
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await;
        assert!(res.is_ok(), "{res:?}");
        assert_eq!(rec.kinds().first(), Some(&EventKind::TargetInternal));
    }

    /// Ignores stop requests forever.
    struct Stuck {
        state: watch::Sender<ServiceState>,
    }

    #[async_trait]
    impl Service for Stuck {
        fn start(&self) -> Result<(), ServiceError> {
            self.state.send_replace(ServiceState::Running);
            Ok(())
        }

        fn stop_async(&self) {
            self.state.send_if_modified(|s| {
                if s.is_running() {
                    *s = ServiceState::Stopping;
                    true
                } else {
                    false
                }
            });
        }

        fn watch_state(&self) -> watch::Receiver<ServiceState> {
            self.state.subscribe()
        }
    }

    #[tokio::test]
    async fn test_grace_exceeded_lists_stuck_modules() {
        let registry = ModuleRegistry::builder()
            .register(module("A", &[]))
            .register(ModuleDescriptor::new("hung").with_factory(|_, _| {
                let (state, _) = watch::channel(ServiceState::Idle);
                Ok(Some(Instance::from_service(Stuck { state })))
            }))
            .register(ModuleDescriptor::new("all").depends_on(["A", "hung"]))
            .build()
            .unwrap();
        let cfg = OrchestratorConfig {
            grace: Duration::from_millis(100),
            ..cfg("all")
        };

        let err = timeout(
            WAIT,
            Orchestrator::builder(registry, cfg)
                .build()
                .run_until(tokio::time::sleep(Duration::from_millis(20))),
        )
        .await
        .expect("grace bounds the wait")
        .unwrap_err();
        match err {
            RuntimeError::GraceExceeded { grace, stuck } => {
                assert_eq!(grace, Duration::from_millis(100));
                assert_eq!(stuck, vec!["hung".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
