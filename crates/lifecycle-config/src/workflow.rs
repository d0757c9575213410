use serde::{Deserialize, Serialize};

use crate::component::ComponentDef;

/// Declarative workflow definition.
///
/// Steps are created in the order they appear, so the first entry becomes the
/// first step (sort index 1) and the last entry the final step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Activate the workflow once all steps are in place.
  #[serde(default)]
  pub active: bool,
  pub steps: Vec<StepDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub predicates: Vec<ComponentDef>,
  #[serde(default)]
  pub effects: Vec<ComponentDef>,
}

impl WorkflowDef {
  /// Parse a workflow definition from JSON.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}
