//! # modvisor
//!
//! **Modvisor** runs a process made of named modules. Each module may depend
//! on others and may produce a long-running service; an operator selects one
//! *target* module and modvisor brings up exactly what it needs, keeps it
//! running as one unit and tears everything down together.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ModuleDescriptor  ModuleDescriptor  ModuleDescriptor
//!   (name, deps,      (name, deps,      (name, deps,
//!    factory)          factory)          factory)
//!        └─────────────────┼─────────────────┘
//!                          ▼
//!            RegistryBuilder::build() ──► ModuleRegistry (arena, validated)
//!                          │
//!                          ▼  resolve(target)
//!            Resolution: dependencies first, target last
//!                          │
//!                          ▼  ModuleConstructor (memoized factories)
//!            (module, Instance) for every non-structural module
//!                          │
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ServiceManager                                                   │
//! │  - start_all / stop_all                                           │
//! │  - watcher per service ──► aggregator ──► ManagerListener(s)      │
//! │                                            └─ CascadeController   │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ publishes
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │            (capacity: OrchestratorConfig::bus_capacity)           │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!                      subscriber_listener ──► SubscriberSet
//!                                           ┌─────────┼─────────┐
//!                                           ▼         ▼         ▼
//!                                        worker1   worker2   workerN
//! ```
//!
//! ### Run
//! ```text
//! Orchestrator::run()
//!   ├─► resolve + construct      (errors: nothing started)
//!   ├─► start_all()
//!   └─► wait for the first of:
//!         - every service terminated on its own  ─► outcome
//!         - a service failed ─► cascade stop_all ─► Err(ServiceFailed { module, cause })
//!         - a termination signal ─► stop_all     ─► Ok(())
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                                   |
//! |-------------------|--------------------------------------------------------------|------------------------------------------------------|
//! | **Modules**       | Register modules, resolve a target, build its services.      | [`ModuleDescriptor`], [`ModuleRegistry`]             |
//! | **Services**      | Lifecycle interface and a closure-backed implementation.     | [`Service`], [`BasicService`], [`ServiceState`]      |
//! | **Lifecycle**     | Start/stop a set of services as one, fail fast.              | [`ServiceManager`], [`CascadeController`]            |
//! | **Orchestration** | Target selection, signals, shutdown grace.                   | [`Orchestrator`], [`OrchestratorConfig`]             |
//! | **Subscriber API**| Hook into runtime events (logging, metrics).                 | [`Subscribe`], [`Event`]                             |
//! | **Errors**        | Typed errors for orchestration and service failures.         | [`RuntimeError`], [`ServiceError`]                   |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], a subscriber that writes events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use modvisor::{
//!     BasicService, Instance, ModuleDescriptor, ModuleRegistry, Orchestrator, OrchestratorConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ModuleRegistry::builder()
//!         .register(
//!             ModuleDescriptor::new("store").internal().with_factory(|_ctx, _deps| {
//!                 let svc = BasicService::new("store", |token| async move {
//!                     token.cancelled().await;
//!                     Ok(())
//!                 });
//!                 Ok(Some(Instance::from_service(svc)))
//!             }),
//!         )
//!         .register(ModuleDescriptor::new("all").depends_on(["store"]))
//!         .build()?;
//!
//!     let mut cfg = OrchestratorConfig::for_target("all");
//!     cfg.handle_os_signals = false;
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn modvisor::Subscribe>> = vec![Arc::new(modvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn modvisor::Subscribe>> = Vec::new();
//!
//!     Orchestrator::builder(registry, cfg)
//!         .with_subscribers(subs)
//!         .build()
//!         .run_until(tokio::time::sleep(Duration::from_millis(10)))
//!         .await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod modules;
mod services;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    CascadeController, ManagerListener, Orchestrator, OrchestratorBuilder, OrchestratorConfig,
    RunOutcome, ServiceManager, wait_for_shutdown_signal,
};
pub use error::{BoxError, RuntimeError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use modules::{
    Dependencies, FactoryFn, ModuleConstructor, ModuleContext, ModuleDescriptor, ModuleId,
    ModuleRegistry, RegistryBuilder, Resolution, ServiceMap, Visibility,
};
pub use services::{BasicService, BoxServiceFuture, Instance, Service, ServiceRef, ServiceState, Termination};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: a built-in subscriber writing events through `tracing`.
// Enabled by default; disable with `default-features = false`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
