//! Lifecycle Config
//!
//! This crate contains the serializable configuration types for lifecycle:
//!
//! - [`LifecycleConfig`]: runtime settings (database location, audit actor,
//!   disabled plugins), loaded from `config.json` in the data directory.
//! - [`WorkflowDef`]: a declarative workflow definition that the engine can
//!   import in one go (workflow, ordered steps, component instances and their
//!   settings).

mod component;
mod runtime;
mod workflow;

pub use component::ComponentDef;
pub use runtime::{ConfigError, LifecycleConfig};
pub use workflow::{StepDef, WorkflowDef};
