//! # Module registry.
//!
//! [`ModuleRegistry`] owns every registered [`ModuleDescriptor`] in an arena.
//! Dependency edges are stored as [`ModuleId`]s (arena indices), validated once
//! when [`RegistryBuilder::build`] runs:
//!
//! - duplicate names are rejected with [`RuntimeError::DuplicateModule`];
//! - dependencies on unregistered names are rejected with [`RuntimeError::UnknownModule`].
//!
//! Cycles are *not* rejected here; they only matter for the part of the graph
//! reachable from a target and are reported by [`ModuleRegistry::resolve`].
//!
//! Registration order is significant: it breaks ties between independent
//! branches of the construction order.

use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::modules::descriptor::ModuleDescriptor;
use crate::modules::resolver::{self, Resolution};

/// Index of a module inside its registry, assigned in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    /// Registration position.
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) struct Node {
    pub(crate) descriptor: ModuleDescriptor,
    /// Dependency edges, sorted by registration order.
    pub(crate) deps: Vec<ModuleId>,
}

/// Validated, immutable set of modules.
pub struct ModuleRegistry {
    nodes: Vec<Node>,
    index: HashMap<String, ModuleId>,
}

impl ModuleRegistry {
    /// Starts an empty registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Looks up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.id(name).map(|id| self.descriptor(id))
    }

    /// Arena index of a module.
    pub fn id(&self, name: &str) -> Option<ModuleId> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// True when the module exists and is public. Unknown names are not visible.
    pub fn is_user_visible(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(ModuleDescriptor::is_user_visible)
    }

    /// Names of the public modules, sorted.
    pub fn user_visible_modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.descriptor.is_user_visible())
            .map(|n| n.descriptor.name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Declared dependencies of a module.
    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(ModuleDescriptor::dependencies)
    }

    /// Every module name, in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.descriptor.name())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes the construction order for `target`.
    ///
    /// The order contains exactly the modules reachable from `target`, every
    /// dependency before its dependents, and ends with `target` itself.
    ///
    /// # Errors
    /// - [`RuntimeError::UnknownModule`] if `target` is not registered;
    /// - [`RuntimeError::CyclicDependency`] if a cycle is reachable from it.
    pub fn resolve(&self, target: &str) -> Result<Resolution, RuntimeError> {
        resolver::resolve(self, target)
    }

    /// Checks the whole graph for cycles, not only what one target reaches.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        resolver::check_all(self)
    }

    pub(crate) fn descriptor(&self, id: ModuleId) -> &ModuleDescriptor {
        &self.nodes[id.0].descriptor
    }

    pub(crate) fn name(&self, id: ModuleId) -> &str {
        self.nodes[id.0].descriptor.name()
    }

    pub(crate) fn deps(&self, id: ModuleId) -> &[ModuleId] {
        &self.nodes[id.0].deps
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|n| &n.descriptor))
            .finish()
    }
}

/// Collects descriptors, then validates them into a [`ModuleRegistry`].
///
/// # Example
/// ```
/// use modvisor::{ModuleDescriptor, ModuleRegistry};
///
/// let registry = ModuleRegistry::builder()
///     .register(ModuleDescriptor::new("store").internal())
///     .register(ModuleDescriptor::new("querier").depends_on(["store"]))
///     .build()
///     .unwrap();
///
/// assert_eq!(registry.user_visible_modules(), ["querier"]);
/// assert_eq!(registry.resolve("querier").unwrap().order(), ["store", "querier"]);
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: Vec<ModuleDescriptor>,
}

impl RegistryBuilder {
    /// Adds a module. Validation happens in [`build`](Self::build).
    pub fn register(mut self, descriptor: ModuleDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Adds several modules, keeping their order.
    pub fn register_all(mut self, descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Validates names and dependency edges.
    pub fn build(self) -> Result<ModuleRegistry, RuntimeError> {
        let mut index = HashMap::with_capacity(self.descriptors.len());
        for (i, desc) in self.descriptors.iter().enumerate() {
            if index.insert(desc.name().to_string(), ModuleId(i)).is_some() {
                return Err(RuntimeError::DuplicateModule {
                    module: desc.name().to_string(),
                });
            }
        }

        let mut nodes = Vec::with_capacity(self.descriptors.len());
        for descriptor in self.descriptors {
            let mut deps = Vec::with_capacity(descriptor.dependencies().len());
            for dep in descriptor.dependencies() {
                let id = index
                    .get(dep)
                    .copied()
                    .ok_or_else(|| RuntimeError::UnknownModule {
                        module: dep.clone(),
                        referenced_by: Some(descriptor.name().to_string()),
                    })?;
                deps.push(id);
            }
            deps.sort_unstable();
            nodes.push(Node { descriptor, deps });
        }

        Ok(ModuleRegistry { nodes, index })
    }
}
