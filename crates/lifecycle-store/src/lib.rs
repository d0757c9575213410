//! Lifecycle Store
//!
//! This crate provides the persisted records and their SQLite storage:
//! workflows, steps, predicate/effect instances, instance settings and
//! processes.
//!
//! Every structural mutation runs in its own short-lived transaction:
//! - sort swaps of workflows and steps go through a reserved temporary slot so
//!   no duplicate sort index is ever observable,
//! - read-then-write transactions take the write lock up front
//!   (`BEGIN IMMEDIATE`) so competing writers queue on the busy timeout,
//! - "next sort index" creation is backed by a uniqueness constraint and
//!   retried on conflict,
//! - a partial unique index guarantees at most one unfinished process per
//!   subject.
//!
//! The [`SettingStore`] trait is the seam plugin instances use for their
//! configuration. [`SqliteStore`] implements it against the database and
//! [`InMemorySettingStore`] is available for tests.

mod settings;
mod sqlite;
mod types;

pub use settings::{InMemorySettingStore, SettingStore};
pub use sqlite::{ProcessTransaction, SqliteStore};
pub use types::{
  ComponentInstance, ComponentKind, InstanceId, MoveDirection, Process, ProcessId, Step, StepId,
  SubjectId, Workflow, WorkflowId,
};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A uniqueness constraint rejected the write.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Primary SQLite result codes for a locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl StoreError {
  pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
  }

  /// A write lost a race with another writer and may succeed when retried.
  pub(crate) fn is_contended(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
      return false;
    };
    if db.is_unique_violation() {
      return true;
    }
    // Extended result codes keep the primary code in the low byte.
    db.code()
      .and_then(|code| code.parse::<i32>().ok())
      .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
  }
}
