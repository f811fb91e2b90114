//! # Service abstractions.
//!
//! This module provides the service-side types:
//! - [`Service`] - capability interface the core drives (start / stop / observe)
//! - [`ServiceRef`] - shared handle to a service (`Arc<dyn Service>`)
//! - [`Instance`] - factory product, downcastable by dependents
//! - [`ServiceState`], [`Termination`] - monotonic lifecycle states
//! - [`BasicService`] - closure-backed implementation

mod basic;
mod service;
mod state;

pub use basic::{BasicService, BoxServiceFuture};
pub use service::{Instance, Service, ServiceRef};
pub use state::{ServiceState, Termination};
