//! # Memoized module construction.
//!
//! [`ModuleConstructor`] walks a [`Resolution`] and invokes each module's
//! factory at most once for the constructor's lifetime. Every factory sees the
//! already-built instances of its transitive dependencies, so a module two
//! dependents share is one instance, not two.
//!
//! Resolution happens before any factory runs: a cyclic or unknown target
//! fails without side effects. A failing factory aborts construction; nothing
//! built so far has been started.

use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::modules::deps::{Dependencies, ModuleContext};
use crate::modules::registry::{ModuleId, ModuleRegistry};
use crate::modules::resolver::{self, Resolution};
use crate::services::{Instance, ServiceRef};

/// Services produced for one target, in construction order.
#[derive(Clone, Debug, Default)]
pub struct ServiceMap {
    entries: Vec<(String, Instance)>,
}

impl ServiceMap {
    pub fn get(&self, module: &str) -> Option<&Instance> {
        self.entries
            .iter()
            .find(|(name, _)| name == module)
            .map(|(_, instance)| instance)
    }

    /// `(module, instance)` pairs in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.entries.iter().map(|(name, inst)| (name.as_str(), inst))
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// `(module, service)` pairs, ready for the service manager.
    pub fn services(&self) -> Vec<(String, ServiceRef)> {
        self.entries
            .iter()
            .map(|(name, inst)| (name.clone(), inst.service().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds module instances on demand, caching every factory result.
pub struct ModuleConstructor<'r> {
    registry: &'r ModuleRegistry,
    built: HashMap<ModuleId, Option<Instance>>,
    bus: Option<Bus>,
}

impl<'r> ModuleConstructor<'r> {
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        Self {
            registry,
            built: HashMap::new(),
            bus: None,
        }
    }

    /// Publishes construction events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds every module `target` needs, reusing anything built before.
    ///
    /// Returns the non-structural products in construction order.
    pub fn construct(&mut self, target: &str) -> Result<ServiceMap, RuntimeError> {
        let resolution = self.registry.resolve(target)?;
        self.construct_resolved(&resolution)
    }

    /// Like [`construct`](Self::construct) for an already computed order.
    pub(crate) fn construct_resolved(&mut self, resolution: &Resolution) -> Result<ServiceMap, RuntimeError> {
        for &id in resolution.ids() {
            if self.built.contains_key(&id) {
                continue;
            }
            let product = self.build(id, resolution.target())?;
            self.built.insert(id, product);
        }

        let mut services = ServiceMap::default();
        for (&id, name) in resolution.ids().iter().zip(resolution.order()) {
            if let Some(Some(instance)) = self.built.get(&id) {
                services.entries.push((name.clone(), instance.clone()));
            }
        }
        Ok(services)
    }

    /// Instance already built for `module`, if any.
    pub fn instance(&self, module: &str) -> Option<&Instance> {
        let id = self.registry.id(module)?;
        self.built.get(&id)?.as_ref()
    }

    /// Number of modules whose factory has run (or that were found structural).
    pub fn built_count(&self) -> usize {
        self.built.len()
    }

    fn build(&self, id: ModuleId, target: &str) -> Result<Option<Instance>, RuntimeError> {
        let descriptor = self.registry.descriptor(id);
        let module = descriptor.name();

        let Some(factory) = descriptor.factory() else {
            self.publish(EventKind::ModuleStructural, module);
            return Ok(None);
        };

        let deps = self.dependencies(id)?;
        let ctx = ModuleContext { module, target };
        let product = factory(&ctx, &deps).map_err(|source| RuntimeError::Construction {
            module: module.to_string(),
            source,
        })?;

        let kind = match product {
            Some(_) => EventKind::ModuleConstructed,
            None => EventKind::ModuleStructural,
        };
        self.publish(kind, module);
        Ok(product)
    }

    fn dependencies(&self, id: ModuleId) -> Result<Dependencies, RuntimeError> {
        let mut deps = Dependencies::default();
        for dep in resolver::closure(self.registry, id)? {
            if let Some(Some(instance)) = self.built.get(&dep) {
                deps.insert(self.registry.name(dep), instance.clone());
            }
        }
        Ok(deps)
    }

    fn publish(&self, kind: EventKind, module: &str) {
        if let Some(bus) = &self.bus {
            bus.publish(Event::new(kind).with_module(module));
        }
    }
}
