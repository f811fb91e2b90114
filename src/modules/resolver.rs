//! # Dependency resolution.
//!
//! Depth-first post-order walk over the registry arena. Each module carries a
//! three-state mark:
//!
//! ```text
//! Unvisited ──enter──► InProgress ──all deps done──► Done (appended to order)
//!                          ▲
//!                          └── reached again while InProgress ⇒ cycle
//! ```
//!
//! The current DFS path is kept on a stack, so a cycle is reported as the exact
//! loop (`a -> b -> c -> a`) rather than just "somewhere".

use crate::error::RuntimeError;
use crate::modules::registry::{ModuleId, ModuleRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Construction order for one target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    target: String,
    ids: Vec<ModuleId>,
    names: Vec<String>,
}

impl Resolution {
    /// The target this order was computed for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Module names, dependencies first; the target is last.
    pub fn order(&self) -> &[String] {
        &self.names
    }

    /// Position of a module in the order.
    pub fn position(&self, module: &str) -> Option<usize> {
        self.names.iter().position(|n| n == module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.position(module).is_some()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn ids(&self) -> &[ModuleId] {
        &self.ids
    }
}

struct Walk<'r> {
    registry: &'r ModuleRegistry,
    marks: Vec<Mark>,
    path: Vec<ModuleId>,
    order: Vec<ModuleId>,
}

impl<'r> Walk<'r> {
    fn new(registry: &'r ModuleRegistry) -> Self {
        Self {
            registry,
            marks: vec![Mark::Unvisited; registry.len()],
            path: Vec::new(),
            order: Vec::new(),
        }
    }

    fn visit(&mut self, id: ModuleId) -> Result<(), RuntimeError> {
        match self.marks[id.0] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(self.cycle(id)),
            Mark::Unvisited => {}
        }

        self.marks[id.0] = Mark::InProgress;
        self.path.push(id);

        let registry = self.registry;
        for &dep in registry.deps(id) {
            self.visit(dep)?;
        }

        self.path.pop();
        self.marks[id.0] = Mark::Done;
        self.order.push(id);
        Ok(())
    }

    fn cycle(&self, back_to: ModuleId) -> RuntimeError {
        let start = self
            .path
            .iter()
            .position(|&p| p == back_to)
            .unwrap_or(0);
        let cycle = self.path[start..]
            .iter()
            .chain(std::iter::once(&back_to))
            .map(|&id| self.registry.name(id).to_string())
            .collect();
        RuntimeError::CyclicDependency { cycle }
    }
}

pub(crate) fn resolve(registry: &ModuleRegistry, target: &str) -> Result<Resolution, RuntimeError> {
    let root = registry
        .id(target)
        .ok_or_else(|| RuntimeError::UnknownModule {
            module: target.to_string(),
            referenced_by: None,
        })?;

    let mut walk = Walk::new(registry);
    walk.visit(root)?;

    let names = walk
        .order
        .iter()
        .map(|&id| registry.name(id).to_string())
        .collect();
    Ok(Resolution {
        target: target.to_string(),
        ids: walk.order,
        names,
    })
}

/// Transitive dependencies of `id`, dependencies first, `id` excluded.
pub(crate) fn closure(registry: &ModuleRegistry, id: ModuleId) -> Result<Vec<ModuleId>, RuntimeError> {
    let mut walk = Walk::new(registry);
    walk.visit(id)?;
    walk.order.pop();
    Ok(walk.order)
}

pub(crate) fn check_all(registry: &ModuleRegistry) -> Result<(), RuntimeError> {
    let mut walk = Walk::new(registry);
    for i in 0..registry.len() {
        walk.visit(ModuleId(i))?;
    }
    Ok(())
}
