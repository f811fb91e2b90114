//! # Orchestrator configuration.
//!
//! Provides [`OrchestratorConfig`], the settings an [`Orchestrator`](crate::Orchestrator)
//! run is built from. Parsing flags or files into it is left to the caller.
//!
//! ## Sentinel values
//! - `grace = 0s` → no shutdown timeout (wait for every service, however long)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Settings of one orchestrator run.
///
/// ## Field semantics
/// - `target`: module to run, together with its dependency closure
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `grace`: maximum wait for services to terminate once a stop was requested (`0s` = no limit)
/// - `handle_os_signals`: whether [`Orchestrator::run`](crate::Orchestrator::run) listens for SIGINT/SIGTERM/SIGQUIT
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Module selected by the operator.
    pub target: String,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Subscribers lagging more than `bus_capacity` events behind skip the oldest ones.
    pub bus_capacity: usize,

    /// Shutdown grace period.
    ///
    /// Once a stop was requested (signal or failure cascade):
    /// - `Duration::ZERO`: wait until every service terminated
    /// - `> 0`: wait at most `grace`, then return `RuntimeError::GraceExceeded`
    pub grace: Duration,

    /// Listen for OS termination signals in `Orchestrator::run`.
    pub handle_os_signals: bool,
}

impl OrchestratorConfig {
    /// Default configuration for the given target.
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Returns the shutdown grace period as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → wait at most `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for OrchestratorConfig {
    /// Default configuration:
    ///
    /// - `target = "all"`
    /// - `bus_capacity = 1024`
    /// - `grace = 0s` (no timeout)
    /// - `handle_os_signals = true`
    fn default() -> Self {
        Self {
            target: "all".to_string(),
            bus_capacity: 1024,
            grace: Duration::ZERO,
            handle_os_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let mut cfg = OrchestratorConfig::for_target("querier");
        assert_eq!(cfg.target, "querier");
        assert_eq!(cfg.shutdown_grace(), None);

        cfg.grace = Duration::from_secs(5);
        cfg.bus_capacity = 0;
        assert_eq!(cfg.shutdown_grace(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
