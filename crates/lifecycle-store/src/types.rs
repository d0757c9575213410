use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
    )]
    #[serde(transparent)]
    #[sqlx(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name {
      fn from(id: i64) -> Self {
        Self(id)
      }
    }
  };
}

id_type!(
  /// Identifier of a workflow.
  WorkflowId
);
id_type!(
  /// Identifier of a step.
  StepId
);
id_type!(
  /// Identifier of a predicate or effect instance. Unique per [`ComponentKind`].
  InstanceId
);
id_type!(
  /// Identifier of a process.
  ProcessId
);
id_type!(
  /// Opaque identifier of a subject record (e.g. a user id). Also used as the
  /// audit actor.
  SubjectId
);

/// The two kinds of pluggable step components.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ComponentKind {
  Predicate,
  Effect,
}

impl ComponentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ComponentKind::Predicate => "predicate",
      ComponentKind::Effect => "effect",
    }
  }

  /// Table holding the instances of this kind.
  pub(crate) fn instance_table(&self) -> &'static str {
    match self {
      ComponentKind::Predicate => "predicate_instance",
      ComponentKind::Effect => "effect_instance",
    }
  }
}

impl fmt::Display for ComponentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Direction of a sort move among siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
  Up,
  Down,
}

impl MoveDirection {
  /// Sort index of the sibling to swap with.
  pub fn neighbor(&self, sort: i64) -> i64 {
    match self {
      MoveDirection::Up => sort - 1,
      MoveDirection::Down => sort + 1,
    }
  }
}

/// A workflow as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Workflow {
  pub id: WorkflowId,
  pub title: String,
  pub description: Option<String>,
  pub sort: i64,
  pub active: bool,
  pub created_by: SubjectId,
  pub modified_by: SubjectId,
  pub created_at: DateTime<Utc>,
  pub modified_at: DateTime<Utc>,
}

/// A step as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Step {
  pub id: StepId,
  pub workflow_id: WorkflowId,
  pub sort: i64,
  pub title: Option<String>,
  pub description: Option<String>,
}

impl Step {
  /// First step of its workflow. No lookup needed.
  pub fn is_first(&self) -> bool {
    self.sort <= 1
  }
}

/// A predicate or effect instance attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ComponentInstance {
  pub id: InstanceId,
  pub step_id: StepId,
  pub kind: ComponentKind,
  /// Registered plugin name the instance resolves to.
  pub name: String,
}

/// A process as stored in the database, joined with its step's workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Process {
  pub id: ProcessId,
  pub subject_id: SubjectId,
  pub step_id: StepId,
  pub workflow_id: WorkflowId,
  pub finished: bool,
  pub created_at: DateTime<Utc>,
  pub modified_at: DateTime<Utc>,
}
