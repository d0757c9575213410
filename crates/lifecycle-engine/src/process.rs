use lifecycle_store::{Process, ProcessId, Step, StepId, StoreError, SubjectId, WorkflowId};
use tracing::{info, instrument, warn};

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{ActionFailure, EngineError};
use crate::events::ProcessEvent;

impl Engine {
  /// Start a process for `subject` in a workflow.
  ///
  /// The process starts at `initial_step`, or at the first step when `None`,
  /// and the effects of that step run before the process is committed. If any
  /// of them fails nothing is persisted and
  /// [`EngineError::ActionExecutionFailed`] is returned.
  ///
  /// The process is created unfinished, even at the final step. Only
  /// [`Engine::transition`] marks a process finished.
  #[instrument(skip_all, fields(subject = %subject, workflow_id = %workflow_id, initial_step = ?initial_step))]
  pub async fn create_process(
    &self,
    ctx: &Context,
    subject: SubjectId,
    workflow_id: WorkflowId,
    initial_step: Option<StepId>,
  ) -> Result<Process, EngineError> {
    let workflow = self.get_workflow(workflow_id).await?;

    let step = match initial_step {
      Some(step_id) => {
        let step = self.get_step(step_id).await?;
        if step.workflow_id != workflow.id {
          return Err(EngineError::InvalidStep {
            step_id,
            workflow_id,
          });
        }
        step
      }
      None => self
        .first_step(workflow_id)
        .await?
        .ok_or(EngineError::EmptyWorkflow { workflow_id })?,
    };

    if !workflow.active {
      return Err(EngineError::WorkflowInactive { workflow_id });
    }

    let effects = self.prepare_effects(&step).await?;

    let mut tx = self.store.begin_process().await?;
    if tx.has_unfinished_process(subject).await? {
      return Err(EngineError::AlreadyInWorkflow {
        subject_id: subject,
      });
    }
    let process = tx
      .insert_process(subject, &step, false, ctx.now())
      .await
      .map_err(|e| match e {
        StoreError::Conflict(_) => EngineError::AlreadyInWorkflow {
          subject_id: subject,
        },
        other => other.into(),
      })?;

    if let Err(failure) = self.run_effects(&process, &effects).await {
      tx.rollback().await?;
      warn!(process_id = %process.id, "rolled back process creation");
      return Err(
        ActionFailure {
          process_id: None,
          ..failure
        }
        .into(),
      );
    }

    tx.commit().await?;

    info!(process_id = %process.id, step_id = %step.id, "created process");
    self.notifier.notify(ProcessEvent::Created {
      process_id: process.id,
      subject_id: subject,
      workflow_id,
      step_id: step.id,
    });

    Ok(process)
  }

  /// Advance a process to `target`, or to the next step when `None`.
  ///
  /// The move is persisted first, then the effects of the target step run in
  /// order. An effect failure stops the remaining effects and returns
  /// [`EngineError::ActionExecutionFailed`]; the process stays at the target
  /// step and effects that already ran are listed in the error.
  #[instrument(skip_all, fields(process_id = %process.id, subject = %process.subject_id, target = ?target))]
  pub async fn transition(
    &self,
    ctx: &Context,
    process: &mut Process,
    target: Option<StepId>,
  ) -> Result<(), EngineError> {
    if process.finished {
      return Err(EngineError::ProcessAlreadyFinished {
        process_id: process.id,
      });
    }

    let target = match target {
      Some(step_id) => self.get_step(step_id).await?,
      None => {
        let current = self.get_step(process.step_id).await?;
        self
          .next_step(&current)
          .await?
          .ok_or(EngineError::NoNextStep {
            process_id: process.id,
            step_id: current.id,
          })?
      }
    };

    if target.workflow_id != process.workflow_id {
      return Err(EngineError::InvalidTargetStep {
        process_id: process.id,
        step_id: target.id,
        workflow_id: process.workflow_id,
      });
    }

    let workflow = self.get_workflow(target.workflow_id).await?;
    if !workflow.active {
      return Err(EngineError::WorkflowInactive {
        workflow_id: workflow.id,
      });
    }

    let finished = self.is_final_step(&target).await?;
    let effects = self.prepare_effects(&target).await?;

    self.persist_step(ctx, process, &target, finished).await?;

    self.run_effects(process, &effects).await?;
    Ok(())
  }

  async fn persist_step(
    &self,
    ctx: &Context,
    process: &mut Process,
    target: &Step,
    finished: bool,
  ) -> Result<(), EngineError> {
    let now = ctx.now();
    self
      .store
      .update_process_step(process.id, target.id, finished, now)
      .await
      .map_err(|e| match e {
        StoreError::Conflict(_) => EngineError::ProcessAlreadyFinished {
          process_id: process.id,
        },
        other => other.into(),
      })?;

    let from_step = process.step_id;
    process.step_id = target.id;
    process.finished = finished;
    process.modified_at = now;

    info!(%from_step, to_step = %target.id, finished, "transitioned process");
    self.notifier.notify(ProcessEvent::Transitioned {
      process_id: process.id,
      from_step,
      to_step: target.id,
      finished,
    });
    Ok(())
  }

  pub async fn get_process(&self, id: ProcessId) -> Result<Process, EngineError> {
    self
      .store
      .get_process(id)
      .await?
      .ok_or(EngineError::ProcessNotFound(id))
  }

  /// Processes of a subject, oldest first.
  pub async fn processes_for_subject(
    &self,
    subject: SubjectId,
    include_finished: bool,
  ) -> Result<Vec<Process>, EngineError> {
    Ok(
      self
        .store
        .list_processes_for_subject(subject, include_finished)
        .await?,
    )
  }

  /// Unfinished processes currently at a step.
  pub async fn active_processes_for_step(
    &self,
    step_id: StepId,
  ) -> Result<Vec<Process>, EngineError> {
    Ok(self.store.list_active_processes_for_step(step_id).await?)
  }
}
