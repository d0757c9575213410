use lifecycle_store::{MoveDirection, Workflow, WorkflowId};
use tracing::{debug, info, instrument};

use crate::context::Context;
use crate::engine::Engine;
use crate::error::EngineError;

impl Engine {
  /// Create an inactive workflow at the end of the workflow order.
  #[instrument(skip_all, fields(title = %title))]
  pub async fn create_workflow(
    &self,
    ctx: &Context,
    title: &str,
    description: Option<&str>,
  ) -> Result<Workflow, EngineError> {
    let title = validate_title(title)?;
    let workflow = self
      .store
      .create_workflow(title, description, ctx.actor, ctx.now())
      .await?;
    info!(workflow_id = %workflow.id, sort = workflow.sort, "created workflow");
    Ok(workflow)
  }

  pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, EngineError> {
    self
      .store
      .get_workflow(id)
      .await?
      .ok_or(EngineError::WorkflowNotFound(id))
  }

  /// All workflows in sort order.
  pub async fn list_workflows(&self) -> Result<Vec<Workflow>, EngineError> {
    Ok(self.store.list_workflows().await?)
  }

  pub async fn workflow_count(&self) -> Result<i64, EngineError> {
    Ok(self.store.count_workflows().await?)
  }

  pub async fn step_count(&self, workflow_id: WorkflowId) -> Result<i64, EngineError> {
    Ok(self.store.count_steps(workflow_id).await?)
  }

  pub async fn activate_workflow(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
  ) -> Result<(), EngineError> {
    self.update_workflow(ctx, workflow, |w| w.active = true).await?;
    info!(workflow_id = %workflow.id, "activated workflow");
    Ok(())
  }

  pub async fn deactivate_workflow(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
  ) -> Result<(), EngineError> {
    self.update_workflow(ctx, workflow, |w| w.active = false).await?;
    info!(workflow_id = %workflow.id, "deactivated workflow");
    Ok(())
  }

  pub async fn set_workflow_title(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
    title: &str,
  ) -> Result<(), EngineError> {
    let title = validate_title(title)?.to_string();
    self.update_workflow(ctx, workflow, |w| w.title = title).await
  }

  pub async fn set_workflow_description(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
    description: Option<&str>,
  ) -> Result<(), EngineError> {
    let description = description.map(str::to_string);
    self
      .update_workflow(ctx, workflow, |w| w.description = description)
      .await
  }

  /// Swap the workflow with its neighbor in `direction`.
  ///
  /// Returns `false` without changing anything when the workflow is already
  /// first (moving up) or last (moving down).
  #[instrument(skip_all, fields(workflow_id = %workflow.id, direction = ?direction))]
  pub async fn move_workflow(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
    direction: MoveDirection,
  ) -> Result<bool, EngineError> {
    let now = ctx.now();
    match self
      .store
      .swap_workflow(workflow.id, direction, ctx.actor, now)
      .await?
    {
      Some(sort) => {
        workflow.sort = sort;
        workflow.modified_by = ctx.actor;
        workflow.modified_at = now;
        info!(sort, "moved workflow");
        Ok(true)
      }
      None => {
        debug!("workflow already at boundary");
        Ok(false)
      }
    }
  }

  /// Bump the modification audit fields of a workflow.
  pub(crate) async fn touch_workflow(
    &self,
    ctx: &Context,
    workflow_id: WorkflowId,
  ) -> Result<(), EngineError> {
    self
      .store
      .touch_workflow(workflow_id, ctx.actor, ctx.now())
      .await
      .map_err(|e| match e {
        lifecycle_store::StoreError::NotFound(_) => EngineError::WorkflowNotFound(workflow_id),
        other => other.into(),
      })
  }

  async fn update_workflow(
    &self,
    ctx: &Context,
    workflow: &mut Workflow,
    apply: impl FnOnce(&mut Workflow),
  ) -> Result<(), EngineError> {
    let mut updated = workflow.clone();
    apply(&mut updated);
    updated.modified_by = ctx.actor;
    updated.modified_at = ctx.now();

    self.store.update_workflow(&updated).await?;
    *workflow = updated;
    Ok(())
  }
}

fn validate_title(title: &str) -> Result<&str, EngineError> {
  let title = title.trim();
  if title.is_empty() {
    return Err(EngineError::EmptyTitle);
  }
  Ok(title)
}
