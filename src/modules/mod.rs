//! # Module graph.
//!
//! - [`ModuleDescriptor`] - name, dependencies, visibility, factory
//! - [`ModuleRegistry`] / [`RegistryBuilder`] - validated arena of descriptors
//! - [`Resolution`] - dependency-first construction order for a target
//! - [`ModuleConstructor`] - memoized factory invocation
//! - [`ModuleContext`], [`Dependencies`] - what a factory receives
//!
//! ```text
//! RegistryBuilder ──build()──► ModuleRegistry ──resolve(target)──► Resolution
//!                                    │                                  │
//!                                    └──────► ModuleConstructor ◄───────┘
//!                                                   │
//!                                                   ▼
//!                                     ServiceMap (module, Instance)*
//! ```

mod constructor;
mod deps;
mod descriptor;
mod registry;
mod resolver;

pub use constructor::{ModuleConstructor, ServiceMap};
pub use deps::{Dependencies, ModuleContext};
pub use descriptor::{FactoryFn, ModuleDescriptor, Visibility};
pub use registry::{ModuleId, ModuleRegistry, RegistryBuilder};
pub use resolver::Resolution;
