use std::sync::Arc;

use lifecycle_component::{Component, Effect, Predicate};
use lifecycle_store::ComponentKind;

use crate::error::ResolveError;
use crate::registry::{PluginInfo, PluginRegistry};

/// Resolves plugin names to implementations.
pub trait Resolver: Send + Sync {
  /// Resolve `(kind, name)` to an enabled implementation of that kind.
  fn resolve(&self, kind: ComponentKind, name: &str) -> Result<Component, ResolveError>;

  /// Registered plugins and whether they are enabled.
  fn plugins(&self) -> Vec<PluginInfo>;

  fn resolve_predicate(&self, name: &str) -> Result<Arc<dyn Predicate>, ResolveError> {
    match self.resolve(ComponentKind::Predicate, name)? {
      Component::Predicate(predicate) => Ok(predicate),
      other => Err(mismatch(ComponentKind::Predicate, name, &other)),
    }
  }

  fn resolve_effect(&self, name: &str) -> Result<Arc<dyn Effect>, ResolveError> {
    match self.resolve(ComponentKind::Effect, name)? {
      Component::Effect(effect) => Ok(effect),
      other => Err(mismatch(ComponentKind::Effect, name, &other)),
    }
  }
}

fn mismatch(kind: ComponentKind, name: &str, found: &Component) -> ResolveError {
  ResolveError::CapabilityMismatch {
    kind,
    name: name.to_string(),
    found: found.kind(),
  }
}

/// Resolver backed by a [`PluginRegistry`].
pub struct StandardResolver {
  registry: PluginRegistry,
}

impl StandardResolver {
  pub fn new(registry: PluginRegistry) -> Self {
    Self { registry }
  }

  pub fn registry(&self) -> &PluginRegistry {
    &self.registry
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, kind: ComponentKind, name: &str) -> Result<Component, ResolveError> {
    let component = self.registry.instantiate(kind, name)?;
    if component.kind() != kind {
      return Err(mismatch(kind, name, &component));
    }
    Ok(component)
  }

  fn plugins(&self) -> Vec<PluginInfo> {
    self.registry.list()
  }
}

#[cfg(test)]
mod tests {
  use lifecycle_component::NoopEffect;

  use super::*;

  #[test]
  fn test_resolve_effect() {
    let resolver = StandardResolver::new(PluginRegistry::with_builtins());
    let effect = resolver.resolve_effect("noop").unwrap();
    assert_eq!(effect.name(), "noop");
  }

  #[test]
  fn test_resolve_unknown_name() {
    let resolver = StandardResolver::new(PluginRegistry::with_builtins());
    let err = resolver.resolve_predicate("inactive_for").err().unwrap();
    assert_eq!(
      err,
      ResolveError::NotFound {
        kind: ComponentKind::Predicate,
        name: "inactive_for".to_string()
      }
    );
  }

  #[test]
  fn test_resolve_wrong_capability() {
    let mut registry = PluginRegistry::new();
    // An effect factory registered under the predicate kind.
    registry.register(
      ComponentKind::Predicate,
      "broken",
      Arc::new(|| Component::Effect(Arc::new(NoopEffect))),
    );
    let resolver = StandardResolver::new(registry);

    let err = resolver.resolve_predicate("broken").err().unwrap();
    assert_eq!(
      err,
      ResolveError::CapabilityMismatch {
        kind: ComponentKind::Predicate,
        name: "broken".to_string(),
        found: ComponentKind::Effect,
      }
    );
  }
}
