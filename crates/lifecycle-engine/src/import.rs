use lifecycle_component::{Component, SettingError};
use lifecycle_config::{ComponentDef, WorkflowDef};
use lifecycle_resolver::Resolver;
use lifecycle_store::{ComponentInstance, ComponentKind, Workflow};
use tracing::{error, info, instrument};

use crate::context::Context;
use crate::engine::Engine;
use crate::error::EngineError;

impl Engine {
  /// Create a workflow with its steps, component instances and settings from
  /// a declarative definition.
  ///
  /// Every plugin name and setting is checked before anything is written.
  /// If a write fails later on, the partially built workflow is deleted.
  #[instrument(skip_all, fields(title = %def.title))]
  pub async fn import_workflow(
    &self,
    ctx: &Context,
    def: &WorkflowDef,
  ) -> Result<Workflow, EngineError> {
    self.check_definition(def)?;

    let mut workflow = self
      .create_workflow(ctx, &def.title, def.description.as_deref())
      .await?;

    if let Err(e) = self.build_workflow(ctx, &mut workflow, def).await {
      error!(workflow_id = %workflow.id, error = %e, "import failed, deleting partial workflow");
      self.store.delete_workflow(workflow.id).await?;
      return Err(e);
    }

    info!(workflow_id = %workflow.id, steps = def.steps.len(), "imported workflow");
    Ok(workflow)
  }

  async fn build_workflow(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
    def: &WorkflowDef,
  ) -> Result<(), EngineError> {
    for step_def in &def.steps {
      let step = self
        .create_step(
          ctx,
          workflow.id,
          step_def.title.as_deref(),
          step_def.description.as_deref(),
        )
        .await?;

      for component in &step_def.predicates {
        let instance = self.add_predicate(ctx, &step, &component.name).await?;
        self.apply_settings(ctx, &instance, component).await?;
      }
      for component in &step_def.effects {
        let instance = self.add_effect(ctx, &step, &component.name).await?;
        self.apply_settings(ctx, &instance, component).await?;
      }
    }

    if def.active {
      self.activate_workflow(ctx, workflow).await?;
    }
    Ok(())
  }

  fn check_definition(&self, def: &WorkflowDef) -> Result<(), EngineError> {
    if def.title.trim().is_empty() {
      return Err(EngineError::EmptyTitle);
    }

    for (index, step_def) in def.steps.iter().enumerate() {
      let components = step_def
        .predicates
        .iter()
        .map(|c| (ComponentKind::Predicate, c))
        .chain(step_def.effects.iter().map(|c| (ComponentKind::Effect, c)));

      for (kind, component_def) in components {
        let component = self.resolver.resolve(kind, &component_def.name)?;
        check_component_settings(&component, component_def).map_err(|source| {
          EngineError::InvalidDefinition {
            step: index + 1,
            kind,
            component: component_def.name.clone(),
            source,
          }
        })?;
      }
    }
    Ok(())
  }

  async fn apply_settings(
    &self,
    ctx: &Context,
    instance: &ComponentInstance,
    def: &ComponentDef,
  ) -> Result<(), EngineError> {
    for (key, value) in &def.settings {
      self
        .set_instance_setting(ctx, instance, key, Some(value))
        .await?;
    }
    Ok(())
  }
}

fn check_component_settings(component: &Component, def: &ComponentDef) -> Result<(), SettingError> {
  let descriptors = component.setting_descriptors();
  for (key, value) in &def.settings {
    let descriptor = descriptors
      .iter()
      .find(|d| &d.key == key)
      .ok_or_else(|| SettingError::Unknown { key: key.clone() })?;
    descriptor.check_writable(Some(value))?;
  }
  Ok(())
}
