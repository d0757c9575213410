use std::collections::BTreeMap;
use std::sync::Arc;

use lifecycle_component::{Component, Effect, NoopEffect, Predicate};
use lifecycle_config::LifecycleConfig;
use lifecycle_store::ComponentKind;
use tracing::warn;

use crate::error::ResolveError;

/// Produces a fresh component value.
pub type Factory = Arc<dyn Fn() -> Component + Send + Sync>;

struct Entry {
  factory: Factory,
  enabled: bool,
}

/// Summary of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
  pub kind: ComponentKind,
  pub name: String,
  pub enabled: bool,
}

/// Registered plugins keyed by kind and name.
#[derive(Default)]
pub struct PluginRegistry {
  entries: BTreeMap<(ComponentKind, String), Entry>,
}

impl PluginRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the plugins shipped with lifecycle.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register_effect(NoopEffect::NAME, || NoopEffect);
    registry
  }

  /// Register a factory under `(kind, name)`, replacing any previous entry.
  pub fn register(&mut self, kind: ComponentKind, name: impl Into<String>, factory: Factory) {
    self.entries.insert(
      (kind, name.into()),
      Entry {
        factory,
        enabled: true,
      },
    );
  }

  pub fn register_predicate<P, F>(&mut self, name: impl Into<String>, factory: F)
  where
    P: Predicate + 'static,
    F: Fn() -> P + Send + Sync + 'static,
  {
    self.register(
      ComponentKind::Predicate,
      name,
      Arc::new(move || Component::Predicate(Arc::new(factory()))),
    );
  }

  pub fn register_effect<E, F>(&mut self, name: impl Into<String>, factory: F)
  where
    E: Effect + 'static,
    F: Fn() -> E + Send + Sync + 'static,
  {
    self.register(
      ComponentKind::Effect,
      name,
      Arc::new(move || Component::Effect(Arc::new(factory()))),
    );
  }

  /// Enable or disable a registered plugin.
  pub fn set_enabled(
    &mut self,
    kind: ComponentKind,
    name: &str,
    enabled: bool,
  ) -> Result<(), ResolveError> {
    let entry = self
      .entries
      .get_mut(&(kind, name.to_string()))
      .ok_or_else(|| ResolveError::NotFound {
        kind,
        name: name.to_string(),
      })?;
    entry.enabled = enabled;
    Ok(())
  }

  /// Disable the plugins listed in the runtime configuration.
  ///
  /// Names that are not registered are logged and skipped.
  pub fn apply_config(&mut self, config: &LifecycleConfig) {
    let disabled = [
      (ComponentKind::Predicate, &config.disabled_predicates),
      (ComponentKind::Effect, &config.disabled_effects),
    ];
    for (kind, names) in disabled {
      for name in names {
        if self.set_enabled(kind, name, false).is_err() {
          warn!(%kind, name, "cannot disable unregistered plugin");
        }
      }
    }
  }

  /// Instantiate a plugin. Disabled plugins are reported as such.
  pub fn instantiate(&self, kind: ComponentKind, name: &str) -> Result<Component, ResolveError> {
    match self.entries.get(&(kind, name.to_string())) {
      Some(entry) if entry.enabled => Ok((entry.factory)()),
      Some(_) => Err(ResolveError::Disabled {
        kind,
        name: name.to_string(),
      }),
      None => Err(ResolveError::NotFound {
        kind,
        name: name.to_string(),
      }),
    }
  }

  /// All registered plugins, predicates first, each kind sorted by name.
  pub fn list(&self) -> Vec<PluginInfo> {
    self
      .entries
      .iter()
      .map(|((kind, name), entry)| PluginInfo {
        kind: *kind,
        name: name.clone(),
        enabled: entry.enabled,
      })
      .collect()
  }
}
