use std::sync::Arc;

use crate::{
    core::{OrchestratorConfig, orchestrator::Orchestrator},
    events::Bus,
    modules::ModuleRegistry,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: OrchestratorConfig,
    registry: Arc<ModuleRegistry>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder for `registry` with the given configuration.
    pub fn new(registry: Arc<ModuleRegistry>, cfg: OrchestratorConfig) -> Self {
        Self {
            cfg,
            registry,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (resolution, lifecycle, cascade)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Overrides the target from the configuration.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.cfg.target = target.into();
        self
    }

    /// Builds the orchestrator.
    ///
    /// Spawns the subscriber workers, so it must be called from within a tokio runtime.
    pub fn build(self) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Orchestrator::new_internal(self.cfg, self.registry, bus, subs)
    }
}
