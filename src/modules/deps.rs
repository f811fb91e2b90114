//! Inputs handed to a module factory.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::BoxError;
use crate::services::{Instance, Service, ServiceRef};

/// Where a factory is being invoked.
#[derive(Clone, Copy, Debug)]
pub struct ModuleContext<'a> {
    pub(crate) module: &'a str,
    pub(crate) target: &'a str,
}

impl<'a> ModuleContext<'a> {
    /// Module being built.
    pub fn module(&self) -> &'a str {
        self.module
    }

    /// Target the run was resolved for.
    pub fn target(&self) -> &'a str {
        self.target
    }
}

/// Already-built instances of a module's transitive dependencies.
///
/// Structural dependencies contribute nothing. Instances are shared: the same
/// dependency seen by two dependents is the same `Arc`.
#[derive(Clone, Debug, Default)]
pub struct Dependencies {
    instances: BTreeMap<String, Instance>,
}

impl Dependencies {
    pub(crate) fn insert(&mut self, module: &str, instance: Instance) {
        self.instances.insert(module.to_string(), instance);
    }

    pub fn get(&self, module: &str) -> Option<&Instance> {
        self.instances.get(module)
    }

    /// Lifecycle handle of a dependency, for `await_running` and friends.
    pub fn service(&self, module: &str) -> Option<&ServiceRef> {
        self.get(module).map(Instance::service)
    }

    /// Concrete handle of a dependency, if it exists and has type `S`.
    pub fn downcast<S: Service>(&self, module: &str) -> Option<Arc<S>> {
        self.get(module).and_then(Instance::downcast::<S>)
    }

    /// Like [`downcast`](Self::downcast), but explains what went wrong.
    pub fn require<S: Service>(&self, module: &str) -> Result<Arc<S>, BoxError> {
        let instance = self
            .get(module)
            .ok_or_else(|| format!("dependency '{module}' produced no service"))?;
        instance.downcast::<S>().ok_or_else(|| {
            format!(
                "dependency '{module}' is not a {}",
                std::any::type_name::<S>()
            )
            .into()
        })
    }

    /// Names of the available dependencies, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
