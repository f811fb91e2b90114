//! # Service lifecycle states.
//!
//! ```text
//! Idle ──► Starting ──► Running ──► Stopping ──► Terminated(StoppedCleanly | Failed(cause))
//!   │          │                        ▲              ▲
//!   │          └────────────────────────┘              │
//!   └──────────────────────────────────────────────────┘
//! ```
//!
//! States are ordered by [`ServiceState::rank`]. A transition is valid only if
//! it strictly increases the rank, so no state is ever revisited. Skipping is
//! allowed: a service stopped while `Starting` goes straight to `Stopping`, and
//! an `Idle` service that is stopped goes straight to `Terminated`.

use crate::error::ServiceError;

/// How a service ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The service finished or was stopped without error.
    StoppedCleanly,
    /// The service ended with a failure cause.
    Failed(ServiceError),
}

/// Lifecycle state of a single service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, not started yet.
    Idle,
    /// Start requested; not ready yet.
    Starting,
    /// Ready and doing its job.
    Running,
    /// Stop requested or body finished; cleaning up.
    Stopping,
    /// Terminal state.
    Terminated(Termination),
}

impl ServiceState {
    /// Position of the state in the lifecycle.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            ServiceState::Idle => 0,
            ServiceState::Starting => 1,
            ServiceState::Running => 2,
            ServiceState::Stopping => 3,
            ServiceState::Terminated(_) => 4,
        }
    }

    /// True if moving from `self` to `next` keeps the lifecycle monotonic.
    #[inline]
    pub fn can_transition_to(&self, next: &ServiceState) -> bool {
        next.rank() > self.rank()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        matches!(self, ServiceState::Terminated(_))
    }

    /// Failure cause, when the service terminated with one.
    pub fn failure_cause(&self) -> Option<&ServiceError> {
        match self {
            ServiceState::Terminated(Termination::Failed(cause)) => Some(cause),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceState::Idle => "idle",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Terminated(Termination::StoppedCleanly) => "terminated",
            ServiceState::Terminated(Termination::Failed(_)) => "failed",
        }
    }
}
