use std::fmt;

use lifecycle_component::{ClauseError, SettingError};
use lifecycle_resolver::ResolveError;
use lifecycle_store::{
  ComponentKind, InstanceId, ProcessId, StepId, StoreError, SubjectId, WorkflowId,
};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of [`EngineError`]s for callers that only need to
/// decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Bad input. Nothing was persisted.
  Validation,
  /// The operation is not allowed in the current state. Nothing was persisted.
  State,
  /// A record or plugin does not exist.
  NotFound,
  /// An effect declined or faulted.
  ActionExecutionFailed,
  /// The database failed.
  Storage,
}

/// Why an effect did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
  /// The effect returned a clean failure.
  Declined,
  /// The effect could not run to a verdict.
  Fault(String),
}

impl fmt::Display for FailureReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FailureReason::Declined => f.write_str("effect reported failure"),
      FailureReason::Fault(message) => write!(f, "effect faulted: {message}"),
    }
  }
}

/// Everything needed to remediate a failed effect by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
  /// `None` when the failure rolled back the creation of the process.
  pub process_id: Option<ProcessId>,
  pub subject_id: SubjectId,
  pub step_id: StepId,
  pub effect: String,
  pub instance_id: InstanceId,
  pub reason: FailureReason,
  /// Effects of the same step that had already succeeded, in order.
  pub executed: Vec<String>,
}

impl fmt::Display for ActionFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "effect '{}' (instance {}) failed at step {} for subject {}",
      self.effect, self.instance_id, self.step_id, self.subject_id
    )?;
    if let Some(process_id) = self.process_id {
      write!(f, " in process {process_id}")?;
    }
    write!(f, ": {}", self.reason)
  }
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("workflow title must not be empty")]
  EmptyTitle,

  #[error("step {step_id} does not belong to workflow {workflow_id}")]
  InvalidStep {
    step_id: StepId,
    workflow_id: WorkflowId,
  },

  #[error("target step {step_id} of process {process_id} belongs to another workflow than {workflow_id}")]
  InvalidTargetStep {
    process_id: ProcessId,
    step_id: StepId,
    workflow_id: WorkflowId,
  },

  #[error("invalid setting for {kind} instance {instance_id}: {source}")]
  InvalidSetting {
    kind: ComponentKind,
    instance_id: InstanceId,
    #[source]
    source: SettingError,
  },

  #[error("{kind} instance {instance_id} is misconfigured: {}", format_problems(.problems))]
  InvalidSettings {
    kind: ComponentKind,
    instance_id: InstanceId,
    problems: Vec<SettingError>,
  },

  #[error("step {step} of definition: {kind} '{component}': {source}")]
  InvalidDefinition {
    step: usize,
    kind: ComponentKind,
    component: String,
    #[source]
    source: SettingError,
  },

  #[error("cannot build selection clause of step {step_id}: {source}")]
  InvalidClause {
    step_id: StepId,
    #[source]
    source: ClauseError,
  },

  #[error("workflow {workflow_id} is not active")]
  WorkflowInactive { workflow_id: WorkflowId },

  #[error("workflow {workflow_id} has no steps")]
  EmptyWorkflow { workflow_id: WorkflowId },

  #[error("subject {subject_id} already has an unfinished process")]
  AlreadyInWorkflow { subject_id: SubjectId },

  #[error("process {process_id} is already finished")]
  ProcessAlreadyFinished { process_id: ProcessId },

  #[error("process {process_id} has no step after {step_id}")]
  NoNextStep {
    process_id: ProcessId,
    step_id: StepId,
  },

  #[error("workflow not found: {0}")]
  WorkflowNotFound(WorkflowId),

  #[error("step not found: {0}")]
  StepNotFound(StepId),

  #[error("process not found: {0}")]
  ProcessNotFound(ProcessId),

  #[error("{kind} instance not found: {instance_id}")]
  InstanceNotFound {
    kind: ComponentKind,
    instance_id: InstanceId,
  },

  #[error("resolve error: {0}")]
  Resolve(#[from] ResolveError),

  #[error("{0}")]
  ActionExecutionFailed(Box<ActionFailure>),

  #[error("store error: {0}")]
  Store(#[from] StoreError),
}

fn format_problems(problems: &[SettingError]) -> String {
  problems
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::EmptyTitle
      | EngineError::InvalidStep { .. }
      | EngineError::InvalidTargetStep { .. }
      | EngineError::InvalidSetting { .. }
      | EngineError::InvalidSettings { .. }
      | EngineError::InvalidDefinition { .. }
      | EngineError::InvalidClause { .. } => ErrorKind::Validation,
      EngineError::WorkflowInactive { .. }
      | EngineError::EmptyWorkflow { .. }
      | EngineError::AlreadyInWorkflow { .. }
      | EngineError::ProcessAlreadyFinished { .. }
      | EngineError::NoNextStep { .. } => ErrorKind::State,
      EngineError::WorkflowNotFound(_)
      | EngineError::StepNotFound(_)
      | EngineError::ProcessNotFound(_)
      | EngineError::InstanceNotFound { .. }
      | EngineError::Resolve(_) => ErrorKind::NotFound,
      EngineError::ActionExecutionFailed(_) => ErrorKind::ActionExecutionFailed,
      EngineError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
      EngineError::Store(StoreError::Conflict(_)) => ErrorKind::State,
      EngineError::Store(_) => ErrorKind::Storage,
    }
  }

  /// Details of a failed effect, if this is one.
  pub fn action_failure(&self) -> Option<&ActionFailure> {
    match self {
      EngineError::ActionExecutionFailed(failure) => Some(failure),
      _ => None,
    }
  }
}

impl From<ActionFailure> for EngineError {
  fn from(failure: ActionFailure) -> Self {
    EngineError::ActionExecutionFailed(Box::new(failure))
  }
}
