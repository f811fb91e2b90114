//! # LogWriter: runtime events as `tracing` records
//!
//! A subscriber that turns every [`Event`] into a `tracing` record. The
//! orchestrator never logs on its own; hand it a `LogWriter` to get the
//! operator-facing log lines, and install whatever `tracing` subscriber the
//! process uses.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO  modvisor: target resolved module="all" order="store, ring, ingester, all"
//! INFO  modvisor: all services running
//! ERROR modvisor: module failed module="ingester" err="disk full"
//! INFO  modvisor: all services stopped
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let module = e.module.as_deref().unwrap_or("unknown");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TargetInternal => {
                warn!(
                    target: "modvisor",
                    module,
                    "selected target is an internal module, is this intended?"
                );
            }
            EventKind::TargetResolved => {
                info!(target: "modvisor", module, order = reason, "target resolved");
            }
            EventKind::ModuleConstructed => {
                debug!(target: "modvisor", module, "module constructed");
            }
            EventKind::ModuleStructural => {
                debug!(target: "modvisor", module, "module has no service");
            }
            EventKind::ServiceStarting => {
                debug!(target: "modvisor", module, "service starting");
            }
            EventKind::ServiceRunning => {
                debug!(target: "modvisor", module, "service running");
            }
            EventKind::ServiceStopping => {
                debug!(target: "modvisor", module, "service stopping");
            }
            EventKind::ServiceStopped => {
                info!(target: "modvisor", module, "service stopped");
            }
            EventKind::ServiceFailed => {
                warn!(target: "modvisor", module, err = reason, "service terminated with failure");
            }
            EventKind::ManagerHealthy => {
                info!(target: "modvisor", "all services running");
            }
            EventKind::ManagerStopped => match e.module.as_deref() {
                Some(origin) => {
                    error!(target: "modvisor", module = origin, err = reason, "all services stopped after failure");
                }
                None => info!(target: "modvisor", "all services stopped"),
            },
            EventKind::ShutdownRequested => {
                info!(target: "modvisor", "termination signal received, stopping all services");
            }
            EventKind::CascadeTriggered => {
                error!(target: "modvisor", module, err = reason, "module failed");
            }
            EventKind::StopProcessRequested => {
                info!(target: "modvisor", module, "received stop signal via return error");
            }
            EventKind::CascadeFailureIgnored => {
                warn!(target: "modvisor", module, err = reason, "module failed during shutdown");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "modvisor", grace_ms = e.grace_ms, "all services stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!(target: "modvisor", grace_ms = e.grace_ms, stuck = reason, "shutdown grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "modvisor", subscriber = module, reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "modvisor", subscriber = module, payload = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
