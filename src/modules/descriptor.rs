//! # Module descriptors.
//!
//! A [`ModuleDescriptor`] is the registration record of one module: its name,
//! the names it depends on, whether an operator may select it as a target, and
//! the factory that builds its service.
//!
//! ## Example
//! ```rust
//! use modvisor::{BasicService, Instance, ModuleDescriptor, Visibility};
//!
//! let store = ModuleDescriptor::new("store")
//!     .internal()
//!     .with_factory(|_ctx, _deps| {
//!         let svc = BasicService::new("store", |token| async move {
//!             token.cancelled().await;
//!             Ok(())
//!         });
//!         Ok(Some(Instance::from_service(svc)))
//!     });
//!
//! let all = ModuleDescriptor::new("all").depends_on(["store"]);
//!
//! assert_eq!(store.visibility(), Visibility::Internal);
//! assert!(store.has_factory());
//! assert!(!all.has_factory());
//! assert_eq!(all.dependencies(), ["store".to_string()]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::modules::deps::{Dependencies, ModuleContext};
use crate::services::Instance;

/// Module factory: builds the module's service from its already-built dependencies.
///
/// `Ok(None)` marks a structural module (no service of its own).
pub type FactoryFn =
    Arc<dyn Fn(&ModuleContext<'_>, &Dependencies) -> Result<Option<Instance>, BoxError> + Send + Sync>;

/// Whether a module may be selected directly as a target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Listed for operators and selectable as a target.
    #[default]
    Public,
    /// Building block for other modules; selecting it directly is allowed but warned about.
    Internal,
}

/// Registration record of one module. Immutable once registered.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    dependencies: Vec<String>,
    visibility: Visibility,
    factory: Option<FactoryFn>,
}

impl ModuleDescriptor {
    /// Creates a public, structural module with no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            visibility: Visibility::Public,
            factory: None,
        }
    }

    /// Appends dependencies, ignoring names already listed.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    /// Marks the module internal-only.
    pub fn internal(self) -> Self {
        self.with_visibility(Visibility::Internal)
    }

    /// Sets the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Sets the factory.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ModuleContext<'_>, &Dependencies) -> Result<Option<Instance>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependency names, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_user_visible(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub(crate) fn factory(&self) -> Option<&FactoryFn> {
        self.factory.as_ref()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("visibility", &self.visibility)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}
