use std::sync::Arc;

use lifecycle_component::{InstanceSettings, Predicate, SelectionClause, validate_settings};
use lifecycle_resolver::Resolver;
use lifecycle_store::{ComponentKind, MoveDirection, Step, StepId, WorkflowId};
use tracing::{debug, info, instrument};

use crate::cache::{ResolvedEffect, ResolvedPredicate, StepComponents};
use crate::context::Context;
use crate::engine::Engine;
use crate::error::EngineError;

impl Engine {
  /// Append a step to a workflow.
  #[instrument(skip_all, fields(workflow_id = %workflow_id))]
  pub async fn create_step(
    &self,
    ctx: &Context,
    workflow_id: WorkflowId,
    title: Option<&str>,
    description: Option<&str>,
  ) -> Result<Step, EngineError> {
    self.get_workflow(workflow_id).await?;
    let step = self
      .store
      .create_step(workflow_id, title, description)
      .await?;
    self.touch_workflow(ctx, workflow_id).await?;
    info!(step_id = %step.id, sort = step.sort, "created step");
    Ok(step)
  }

  pub async fn get_step(&self, id: StepId) -> Result<Step, EngineError> {
    self
      .store
      .get_step(id)
      .await?
      .ok_or(EngineError::StepNotFound(id))
  }

  /// Steps of a workflow in sort order.
  pub async fn workflow_steps(&self, workflow_id: WorkflowId) -> Result<Vec<Step>, EngineError> {
    Ok(self.store.list_steps(workflow_id).await?)
  }

  pub async fn first_step(&self, workflow_id: WorkflowId) -> Result<Option<Step>, EngineError> {
    Ok(self.store.find_step_by_sort(workflow_id, 1).await?)
  }

  pub async fn last_step(&self, workflow_id: WorkflowId) -> Result<Option<Step>, EngineError> {
    let count = self.store.count_steps(workflow_id).await?;
    Ok(self.store.find_step_by_sort(workflow_id, count).await?)
  }

  /// The step after `step` in its workflow, `None` for the final step.
  pub async fn next_step(&self, step: &Step) -> Result<Option<Step>, EngineError> {
    Ok(
      self
        .store
        .find_step_by_sort(step.workflow_id, MoveDirection::Down.neighbor(step.sort))
        .await?,
    )
  }

  /// The step before `step` in its workflow, `None` for the first step.
  pub async fn previous_step(&self, step: &Step) -> Result<Option<Step>, EngineError> {
    if step.is_first() {
      return Ok(None);
    }
    Ok(
      self
        .store
        .find_step_by_sort(step.workflow_id, MoveDirection::Up.neighbor(step.sort))
        .await?,
    )
  }

  pub async fn is_final_step(&self, step: &Step) -> Result<bool, EngineError> {
    Ok(self.next_step(step).await?.is_none())
  }

  pub async fn is_first_step(&self, step: &Step) -> Result<bool, EngineError> {
    Ok(step.is_first() || self.previous_step(step).await?.is_none())
  }

  /// Swap the step with its neighbor in `direction`, then touch it.
  ///
  /// Returns `false` without changing anything at either boundary.
  #[instrument(skip_all, fields(step_id = %step.id, direction = ?direction))]
  pub async fn move_step(
    &self,
    ctx: &Context,
    step: &mut Step,
    direction: MoveDirection,
  ) -> Result<bool, EngineError> {
    match self.store.swap_step(step.id, direction).await? {
      Some(sort) => {
        step.sort = sort;
        self.touch_step(ctx, step).await?;
        info!(sort, "moved step");
        Ok(true)
      }
      None => {
        debug!("step already at boundary");
        Ok(false)
      }
    }
  }

  /// Drop the step's cached components and touch its workflow.
  pub async fn touch_step(&self, ctx: &Context, step: &Step) -> Result<(), EngineError> {
    self.cache.invalidate(step.id).await;
    self.touch_workflow(ctx, step.workflow_id).await
  }

  /// The resolved predicates and effects of a step.
  ///
  /// Loaded on first access and cached until the step is touched.
  pub async fn step_components(&self, step: &Step) -> Result<Arc<StepComponents>, EngineError> {
    if let Some(components) = self.cache.get(step.id).await {
      return Ok(components);
    }

    let version = self.cache.version(step.id).await;
    let mut components = StepComponents::default();

    for instance in self
      .store
      .list_instances(ComponentKind::Predicate, step.id)
      .await?
    {
      let predicate = self.resolver.resolve_predicate(&instance.name)?;
      components
        .predicates
        .push(ResolvedPredicate { instance, predicate });
    }

    for instance in self
      .store
      .list_instances(ComponentKind::Effect, step.id)
      .await?
    {
      let effect = self.resolver.resolve_effect(&instance.name)?;
      components.effects.push(ResolvedEffect { instance, effect });
    }

    let components = Arc::new(components);
    if !self.cache.fill(step.id, version, components.clone()).await {
      debug!(step_id = %step.id, "step touched while loading components, not caching");
    }
    Ok(components)
  }

  /// The conjunction of the selection clauses of all predicates of a step.
  ///
  /// A step without predicates selects every subject.
  pub async fn step_selection_clause(&self, step: &Step) -> Result<SelectionClause, EngineError> {
    let components = self.step_components(step).await?;
    let mut clauses = Vec::with_capacity(components.predicates.len());

    for ResolvedPredicate {
      instance,
      predicate,
    } in &components.predicates
    {
      let descriptors = predicate.setting_descriptors();
      let settings =
        InstanceSettings::load(&self.store, ComponentKind::Predicate, instance.id, &descriptors)
          .await?;
      let problems = validate_settings(&settings, &descriptors);
      if !problems.is_empty() {
        return Err(EngineError::InvalidSettings {
          kind: ComponentKind::Predicate,
          instance_id: instance.id,
          problems,
        });
      }

      let clause = predicate
        .selection_clause(&settings)
        .map_err(|source| EngineError::InvalidClause {
          step_id: step.id,
          source,
        })?;
      clauses.push(clause);
    }

    SelectionClause::all(clauses).map_err(|source| EngineError::InvalidClause {
      step_id: step.id,
      source,
    })
  }
}
