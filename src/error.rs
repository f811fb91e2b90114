//! Error types used by the modvisor runtime and by services.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors raised by the orchestration runtime itself
//!   (registry, resolution, construction, lifecycle aggregation).
//! - [`ServiceError`]: failure causes carried by a terminated service.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`ServiceError::is_stop_request`] identifies the clean-stop sentinel.

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by module factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the modvisor runtime.
///
/// Resolution and construction errors are raised before any service is started.
/// [`RuntimeError::ServiceFailed`] is the terminal error of a run that was torn
/// down by the failure cascade.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A module name was looked up but never registered.
    #[error("unknown module '{module}'{}", referenced_by_suffix(.referenced_by))]
    UnknownModule {
        /// The missing module name.
        module: String,
        /// Module that listed the missing name as a dependency, if any.
        referenced_by: Option<String>,
    },

    /// The same module name was registered twice.
    #[error("module '{module}' registered more than once")]
    DuplicateModule {
        /// The duplicated module name.
        module: String,
    },

    /// The dependency graph reachable from the target contains a cycle.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Modules on the cycle; the first name is repeated at the end.
        cycle: Vec<String>,
    },

    /// A module factory failed; nothing was started.
    #[error("failed to construct module '{module}': {source}")]
    Construction {
        /// The module whose factory failed.
        module: String,
        /// The factory error.
        #[source]
        source: BoxError,
    },

    /// The target resolved to structural modules only.
    #[error("target '{target}' does not produce any service")]
    NoServices {
        /// The selected target.
        target: String,
    },

    /// A service refused to start (it was not idle).
    #[error("failed to start service of module '{module}': {source}")]
    ManagerStart {
        /// The module owning the service.
        module: String,
        /// The refusal reported by the service.
        #[source]
        source: ServiceError,
    },

    /// A service failed and the whole set was stopped.
    #[error("module '{module}' failed: {cause}")]
    ServiceFailed {
        /// The module whose failure triggered the cascade.
        module: String,
        /// The failure cause reported by the service.
        cause: ServiceError,
    },

    /// Shutdown grace period was exceeded; some services never terminated.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Modules whose services had not terminated in time.
        stuck: Vec<String>,
    },
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(parent) => format!(" (dependency of '{parent}')"),
        None => String::new(),
    }
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::RuntimeError;
    ///
    /// let err = RuntimeError::NoServices { target: "all".into() };
    /// assert_eq!(err.as_label(), "runtime_no_services");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::UnknownModule { .. } => "runtime_unknown_module",
            RuntimeError::DuplicateModule { .. } => "runtime_duplicate_module",
            RuntimeError::CyclicDependency { .. } => "runtime_cyclic_dependency",
            RuntimeError::Construction { .. } => "runtime_construction",
            RuntimeError::NoServices { .. } => "runtime_no_services",
            RuntimeError::ManagerStart { .. } => "runtime_manager_start",
            RuntimeError::ServiceFailed { .. } => "runtime_service_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck modules={stuck:?}")
            }
            RuntimeError::ServiceFailed { module, cause } => {
                format!("module={module} cause={}", cause.as_message())
            }
            other => other.to_string(),
        }
    }

    /// Name of the module the error is about, if there is one.
    pub fn module(&self) -> Option<&str> {
        match self {
            RuntimeError::UnknownModule { module, .. }
            | RuntimeError::DuplicateModule { module }
            | RuntimeError::Construction { module, .. }
            | RuntimeError::ManagerStart { module, .. }
            | RuntimeError::ServiceFailed { module, .. } => Some(module),
            _ => None,
        }
    }
}

/// # Failure causes carried by a terminated service.
///
/// A service that ends in `Terminated(Failed(..))` exposes one of these through
/// [`Service::failure_cause`](crate::Service::failure_cause).
/// [`ServiceError::StopProcess`] is a sentinel: the service asks for the whole
/// process to stop and the run is still reported as clean.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service failed while doing its job.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error (bad configuration, lost invariant).
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The service requests an orderly stop of the whole process.
    #[error("stop requested by service")]
    StopProcess,

    /// The service body observed cancellation and gave up.
    #[error("context cancelled")]
    Canceled,

    /// The service body panicked.
    #[error("service panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },

    /// A lifecycle call was made in the wrong state.
    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState {
        /// State required by the call.
        expected: &'static str,
        /// State the service was actually in.
        actual: &'static str,
    },
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ServiceError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`ServiceError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        ServiceError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use modvisor::ServiceError;
    ///
    /// assert_eq!(ServiceError::fail("disk full").as_label(), "service_failed");
    /// assert_eq!(ServiceError::StopProcess.as_label(), "service_stop_process");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Fatal { .. } => "service_fatal",
            ServiceError::StopProcess => "service_stop_process",
            ServiceError::Canceled => "service_canceled",
            ServiceError::Panicked { .. } => "service_panicked",
            ServiceError::InvalidState { .. } => "service_invalid_state",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ServiceError::Fail { error } => error.clone(),
            ServiceError::Fatal { error } => format!("fatal: {error}"),
            ServiceError::StopProcess => "stop process".to_string(),
            ServiceError::Canceled => "context cancelled".to_string(),
            ServiceError::Panicked { info } => format!("panic: {info}"),
            ServiceError::InvalidState { expected, actual } => {
                format!("expected {expected}, found {actual}")
            }
        }
    }

    /// True for the clean-stop sentinel.
    ///
    /// # Example
    /// ```
    /// use modvisor::ServiceError;
    ///
    /// assert!(ServiceError::StopProcess.is_stop_request());
    /// assert!(!ServiceError::fail("boom").is_stop_request());
    /// ```
    pub fn is_stop_request(&self) -> bool {
        matches!(self, ServiceError::StopProcess)
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_module_mentions_parent() {
        let err = RuntimeError::UnknownModule {
            module: "store".into(),
            referenced_by: Some("querier".into()),
        };
        assert_eq!(
            err.to_string(),
            "unknown module 'store' (dependency of 'querier')"
        );

        let err = RuntimeError::UnknownModule {
            module: "nope".into(),
            referenced_by: None,
        };
        assert_eq!(err.to_string(), "unknown module 'nope'");
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let err = RuntimeError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
        assert_eq!(err.module(), None);
    }

    #[test]
    fn test_service_failed_names_module_and_cause() {
        let err = RuntimeError::ServiceFailed {
            module: "B".into(),
            cause: ServiceError::fail("disk full"),
        };
        let text = err.to_string();
        assert!(text.contains("'B'"), "{text}");
        assert!(text.contains("disk full"), "{text}");
        assert_eq!(err.module(), Some("B"));
        assert_eq!(err.as_message(), "module=B cause=disk full");
    }

    #[test]
    fn test_construction_keeps_source() {
        let err = RuntimeError::Construction {
            module: "ingester".into(),
            source: "bad config".into(),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("bad config"));
        assert_eq!(err.as_label(), "runtime_construction");
    }
}
