use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lifecycle_store::{ComponentKind, Process};

use crate::clause::SelectionClause;
use crate::descriptor::SettingDescriptor;
use crate::error::{ClauseError, EffectError};
use crate::settings::InstanceSettings;

/// Selects candidate subjects for a step.
pub trait Predicate: Send + Sync {
  /// Stable name used for persistence and resolution.
  fn name(&self) -> &str;

  fn setting_descriptors(&self) -> Vec<SettingDescriptor> {
    Vec::new()
  }

  /// Build the clause for one configured instance.
  fn selection_clause(&self, settings: &InstanceSettings) -> Result<SelectionClause, ClauseError>;
}

/// Acts on the subject of a process when the process enters a step.
#[async_trait]
pub trait Effect: Send + Sync {
  /// Stable name used for persistence and resolution.
  fn name(&self) -> &str;

  fn setting_descriptors(&self) -> Vec<SettingDescriptor> {
    Vec::new()
  }

  /// Run the effect for `process`.
  ///
  /// `Ok(true)` means the side effect was applied, `Ok(false)` is a clean
  /// failure with nothing applied. Faults are returned as `Err`.
  async fn execute(
    &self,
    process: &Process,
    settings: &InstanceSettings,
  ) -> Result<bool, EffectError>;
}

/// A registered implementation of either capability.
#[derive(Clone)]
pub enum Component {
  Predicate(Arc<dyn Predicate>),
  Effect(Arc<dyn Effect>),
}

impl Component {
  pub fn kind(&self) -> ComponentKind {
    match self {
      Component::Predicate(_) => ComponentKind::Predicate,
      Component::Effect(_) => ComponentKind::Effect,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Component::Predicate(p) => p.name(),
      Component::Effect(e) => e.name(),
    }
  }

  pub fn setting_descriptors(&self) -> Vec<SettingDescriptor> {
    match self {
      Component::Predicate(p) => p.setting_descriptors(),
      Component::Effect(e) => e.setting_descriptors(),
    }
  }
}

impl fmt::Debug for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Component")
      .field("kind", &self.kind())
      .field("name", &self.name())
      .finish()
  }
}
