//! Lifecycle Resolver
//!
//! Maps `(component kind, name)` pairs to registered plugin implementations.
//!
//! Plugins are registered once at startup in a [`PluginRegistry`] as factories.
//! A [`Resolver`] hands out fresh [`Component`](lifecycle_component::Component)
//! values for enabled plugins and fails for unknown or disabled names.

mod error;
mod registry;
mod resolver;

pub use error::ResolveError;
pub use registry::{Factory, PluginInfo, PluginRegistry};
pub use resolver::{Resolver, StandardResolver};
