use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A predicate or effect instance attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDef {
  /// Registered plugin name, e.g. `noop`.
  pub name: String,
  /// Instance settings. Keys must match the plugin's setting descriptors.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub settings: BTreeMap<String, String>,
}

impl ComponentDef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      settings: BTreeMap::new(),
    }
  }

  pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.settings.insert(key.into(), value.into());
    self
  }
}
