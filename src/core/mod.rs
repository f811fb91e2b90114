//! Runtime core: lifecycle aggregation and orchestration.
//!
//! Public API from this module is [`Orchestrator`] (with its builder and
//! config), [`ServiceManager`] and the listener/cascade pair that drives it.
//!
//! Internal modules:
//! - [`manager`]: aggregates service lifecycles, fires listeners, records the outcome;
//! - [`cascade`]: stops every service when one fails;
//! - [`orchestrator`]: target → resolution → construction → run, with shutdown and grace;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod cascade;
mod config;
mod listener;
mod manager;
mod orchestrator;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use cascade::CascadeController;
pub use config::OrchestratorConfig;
pub use listener::ManagerListener;
pub use manager::{RunOutcome, ServiceManager};
pub use orchestrator::Orchestrator;
pub use shutdown::wait_for_shutdown_signal;
