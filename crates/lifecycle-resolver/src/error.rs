use lifecycle_store::ComponentKind;
use thiserror::Error;

/// Errors that can occur while resolving a plugin by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  /// No plugin with this name is registered.
  #[error("{kind} plugin not found: {name}")]
  NotFound { kind: ComponentKind, name: String },

  /// The plugin is registered but disabled.
  #[error("{kind} plugin is disabled: {name}")]
  Disabled { kind: ComponentKind, name: String },

  /// The registered factory produced the wrong capability.
  #[error("plugin '{name}' is registered as {kind} but provides a {found}")]
  CapabilityMismatch {
    kind: ComponentKind,
    name: String,
    found: ComponentKind,
  },
}
