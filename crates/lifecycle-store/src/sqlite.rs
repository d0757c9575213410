use std::collections::BTreeMap;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::StoreError;
use crate::settings::SettingStore;
use crate::types::{
  ComponentInstance, ComponentKind, InstanceId, MoveDirection, Process, ProcessId, Step, StepId,
  SubjectId, Workflow, WorkflowId,
};

/// Attempts for writes that race another writer.
const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Pause before a retry, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Takes the write lock up front so a busy database waits on `busy_timeout`
/// instead of failing the lock upgrade after a read.
const BEGIN_IMMEDIATE: &str = "BEGIN IMMEDIATE";

/// Sort slot reserved for the record being swapped.
const SWAP_SLOT: i64 = 0;

/// SQLite-based store implementation.
#[derive(Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

#[derive(FromRow)]
struct InstanceRow {
  id: InstanceId,
  step_id: StepId,
  name: String,
}

impl InstanceRow {
  fn into_instance(self, kind: ComponentKind) -> ComponentInstance {
    ComponentInstance {
      id: self.id,
      step_id: self.step_id,
      kind,
      name: self.name,
    }
  }
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Connect to the database at `url`, creating it if missing, and run
  /// migrations.
  pub async fn connect(url: &str) -> Result<Self, StoreError> {
    if url.contains(":memory:") {
      return Self::in_memory().await;
    }

    let options = SqliteConnectOptions::from_str(url)?
      .create_if_missing(true)
      .journal_mode(SqliteJournalMode::Wal)
      .foreign_keys(true)
      .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Open a private in-memory database with migrations applied.
  ///
  /// The pool holds exactly one connection that never expires, since every
  /// connection to `:memory:` would otherwise see its own empty database.
  pub async fn in_memory() -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect_with(options)
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    self.pool.begin_with(BEGIN_IMMEDIATE).await
  }

  // ---------------------------------------------------------------------------
  // Workflows
  // ---------------------------------------------------------------------------

  /// Insert a new inactive workflow at sort index `max(sort) + 1`.
  pub async fn create_workflow(
    &self,
    title: &str,
    description: Option<&str>,
    actor: SubjectId,
    now: DateTime<Utc>,
  ) -> Result<Workflow, StoreError> {
    with_retry("workflow creation", move || {
      self.try_create_workflow(title, description, actor, now)
    })
    .await
  }

  async fn try_create_workflow(
    &self,
    title: &str,
    description: Option<&str>,
    actor: SubjectId,
    now: DateTime<Utc>,
  ) -> Result<Workflow, sqlx::Error> {
    let mut tx = self.begin_write().await?;

    let sort: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(sort), 0) + 1 FROM workflow")
      .fetch_one(&mut *tx)
      .await?;

    let id = sqlx::query(
      r#"
            INSERT INTO workflow (title, description, sort, active, created_by, modified_by, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(title)
    .bind(description)
    .bind(sort)
    .bind(false)
    .bind(actor)
    .bind(actor)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(Workflow {
      id: WorkflowId(id),
      title: title.to_string(),
      description: description.map(str::to_string),
      sort,
      active: false,
      created_by: actor,
      modified_by: actor,
      created_at: now,
      modified_at: now,
    })
  }

  /// Get a workflow by ID.
  pub async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
    let workflow = sqlx::query_as(
      r#"
            SELECT id, title, description, sort, active, created_by, modified_by, created_at, modified_at
            FROM workflow
            WHERE id = ?
            "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(workflow)
  }

  /// List all workflows ordered by sort index.
  pub async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
    let workflows = sqlx::query_as(
      r#"
            SELECT id, title, description, sort, active, created_by, modified_by, created_at, modified_at
            FROM workflow
            ORDER BY sort ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(workflows)
  }

  pub async fn count_workflows(&self) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM workflow")
      .fetch_one(&self.pool)
      .await?;
    Ok(count)
  }

  /// Write back the mutable attributes of a workflow (everything but its sort
  /// index and creation fields).
  pub async fn update_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            UPDATE workflow
            SET title = ?, description = ?, active = ?, modified_by = ?, modified_at = ?
            WHERE id = ?
            "#,
    )
    .bind(&workflow.title)
    .bind(&workflow.description)
    .bind(workflow.active)
    .bind(workflow.modified_by)
    .bind(workflow.modified_at)
    .bind(workflow.id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(format!("workflow {}", workflow.id)));
    }
    Ok(())
  }

  /// Bump the modification audit fields of a workflow.
  pub async fn touch_workflow(
    &self,
    id: WorkflowId,
    actor: SubjectId,
    now: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE workflow SET modified_by = ?, modified_at = ? WHERE id = ?")
      .bind(actor)
      .bind(now)
      .bind(id)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(format!("workflow {id}")));
    }
    Ok(())
  }

  /// Swap the sort index of a workflow with its neighbor in `direction`,
  /// touching both records.
  ///
  /// Returns the new sort index, or `None` when the workflow is already at
  /// the boundary.
  pub async fn swap_workflow(
    &self,
    id: WorkflowId,
    direction: MoveDirection,
    actor: SubjectId,
    now: DateTime<Utc>,
  ) -> Result<Option<i64>, StoreError> {
    let mut tx = self.begin_write().await?;

    let current: i64 = sqlx::query_scalar("SELECT sort FROM workflow WHERE id = ?")
      .bind(id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| StoreError::NotFound(format!("workflow {id}")))?;

    let target = direction.neighbor(current);
    let other: Option<WorkflowId> = sqlx::query_scalar("SELECT id FROM workflow WHERE sort = ?")
      .bind(target)
      .fetch_optional(&mut *tx)
      .await?;

    let Some(other) = other else {
      return Ok(None);
    };

    sqlx::query("UPDATE workflow SET sort = ? WHERE id = ?")
      .bind(SWAP_SLOT)
      .bind(id)
      .execute(&mut *tx)
      .await?;

    for (workflow_id, sort) in [(other, current), (id, target)] {
      sqlx::query("UPDATE workflow SET sort = ?, modified_by = ?, modified_at = ? WHERE id = ?")
        .bind(sort)
        .bind(actor)
        .bind(now)
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(workflow_id = %id, other_id = %other, from = current, to = target, "swapped workflow sort");

    Ok(Some(target))
  }

  /// Delete a workflow that no process has entered, together with its steps,
  /// instances and their settings. Later workflows move up one sort index.
  pub async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StoreError> {
    let mut tx = self.begin_write().await?;

    let sort: i64 = sqlx::query_scalar("SELECT sort FROM workflow WHERE id = ?")
      .bind(id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| StoreError::NotFound(format!("workflow {id}")))?;

    let entered: bool = sqlx::query_scalar(
      "SELECT EXISTS (SELECT 1 FROM process p JOIN step s ON s.id = p.step_id WHERE s.workflow_id = ?)",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    if entered {
      return Err(StoreError::Conflict(format!("workflow {id} has processes")));
    }

    for kind in [ComponentKind::Predicate, ComponentKind::Effect] {
      let sql = format!(
        r#"
            DELETE FROM instance_setting
            WHERE component_kind = ? AND instance_id IN (
              SELECT i.id FROM {} i JOIN step s ON s.id = i.step_id WHERE s.workflow_id = ?
            )
            "#,
        kind.instance_table()
      );
      sqlx::query(&sql).bind(kind).bind(id).execute(&mut *tx).await?;
    }

    // Steps cascade to their instances.
    sqlx::query("DELETE FROM step WHERE workflow_id = ?")
      .bind(id)
      .execute(&mut *tx)
      .await?;
    sqlx::query("DELETE FROM workflow WHERE id = ?")
      .bind(id)
      .execute(&mut *tx)
      .await?;

    let later: Vec<WorkflowId> =
      sqlx::query_scalar("SELECT id FROM workflow WHERE sort > ? ORDER BY sort ASC")
        .bind(sort)
        .fetch_all(&mut *tx)
        .await?;
    for workflow_id in &later {
      sqlx::query("UPDATE workflow SET sort = sort - 1 WHERE id = ?")
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(workflow_id = %id, sort, shifted = later.len(), "deleted workflow");
    Ok(())
  }

  // ---------------------------------------------------------------------------
  // Steps
  // ---------------------------------------------------------------------------

  /// Append a step to a workflow at sort index `max(sort) + 1`.
  pub async fn create_step(
    &self,
    workflow_id: WorkflowId,
    title: Option<&str>,
    description: Option<&str>,
  ) -> Result<Step, StoreError> {
    with_retry("step creation", move || {
      self.try_create_step(workflow_id, title, description)
    })
    .await
  }

  async fn try_create_step(
    &self,
    workflow_id: WorkflowId,
    title: Option<&str>,
    description: Option<&str>,
  ) -> Result<Step, sqlx::Error> {
    let mut tx = self.begin_write().await?;

    let sort: i64 =
      sqlx::query_scalar("SELECT COALESCE(MAX(sort), 0) + 1 FROM step WHERE workflow_id = ?")
        .bind(workflow_id)
        .fetch_one(&mut *tx)
        .await?;

    let id = sqlx::query(
      r#"
            INSERT INTO step (workflow_id, sort, title, description)
            VALUES (?, ?, ?, ?)
            "#,
    )
    .bind(workflow_id)
    .bind(sort)
    .bind(title)
    .bind(description)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(Step {
      id: StepId(id),
      workflow_id,
      sort,
      title: title.map(str::to_string),
      description: description.map(str::to_string),
    })
  }

  pub async fn get_step(&self, id: StepId) -> Result<Option<Step>, StoreError> {
    let step = sqlx::query_as(
      r#"
            SELECT id, workflow_id, sort, title, description
            FROM step
            WHERE id = ?
            "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(step)
  }

  /// Find the step at a given sort index within a workflow.
  pub async fn find_step_by_sort(
    &self,
    workflow_id: WorkflowId,
    sort: i64,
  ) -> Result<Option<Step>, StoreError> {
    let step = sqlx::query_as(
      r#"
            SELECT id, workflow_id, sort, title, description
            FROM step
            WHERE workflow_id = ? AND sort = ?
            "#,
    )
    .bind(workflow_id)
    .bind(sort)
    .fetch_optional(&self.pool)
    .await?;

    Ok(step)
  }

  /// List the steps of a workflow ordered by sort index.
  pub async fn list_steps(&self, workflow_id: WorkflowId) -> Result<Vec<Step>, StoreError> {
    let steps = sqlx::query_as(
      r#"
            SELECT id, workflow_id, sort, title, description
            FROM step
            WHERE workflow_id = ?
            ORDER BY sort ASC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(steps)
  }

  pub async fn count_steps(&self, workflow_id: WorkflowId) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM step WHERE workflow_id = ?")
      .bind(workflow_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(count)
  }

  /// Swap the sort index of a step with its neighbor in `direction` within
  /// the same workflow.
  ///
  /// Returns the new sort index, or `None` when the step is already at the
  /// boundary.
  pub async fn swap_step(
    &self,
    id: StepId,
    direction: MoveDirection,
  ) -> Result<Option<i64>, StoreError> {
    let mut tx = self.begin_write().await?;

    let (workflow_id, current): (WorkflowId, i64) =
      sqlx::query_as("SELECT workflow_id, sort FROM step WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("step {id}")))?;

    let target = direction.neighbor(current);
    let other: Option<StepId> =
      sqlx::query_scalar("SELECT id FROM step WHERE workflow_id = ? AND sort = ?")
        .bind(workflow_id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(other) = other else {
      return Ok(None);
    };

    for (step_id, sort) in [(id, SWAP_SLOT), (other, current), (id, target)] {
      sqlx::query("UPDATE step SET sort = ? WHERE id = ?")
        .bind(sort)
        .bind(step_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(step_id = %id, other_id = %other, from = current, to = target, "swapped step sort");

    Ok(Some(target))
  }

  // ---------------------------------------------------------------------------
  // Predicate / effect instances
  // ---------------------------------------------------------------------------

  pub async fn create_instance(
    &self,
    kind: ComponentKind,
    step_id: StepId,
    name: &str,
  ) -> Result<ComponentInstance, StoreError> {
    let sql = format!(
      "INSERT INTO {} (step_id, kind_name) VALUES (?, ?)",
      kind.instance_table()
    );
    let id = sqlx::query(&sql)
      .bind(step_id)
      .bind(name)
      .execute(&self.pool)
      .await?
      .last_insert_rowid();

    Ok(ComponentInstance {
      id: InstanceId(id),
      step_id,
      kind,
      name: name.to_string(),
    })
  }

  pub async fn get_instance(
    &self,
    kind: ComponentKind,
    id: InstanceId,
  ) -> Result<Option<ComponentInstance>, StoreError> {
    let sql = format!(
      "SELECT id, step_id, kind_name AS name FROM {} WHERE id = ?",
      kind.instance_table()
    );
    let row: Option<InstanceRow> = sqlx::query_as(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(|row| row.into_instance(kind)))
  }

  /// List the instances of one kind attached to a step, in attachment order.
  pub async fn list_instances(
    &self,
    kind: ComponentKind,
    step_id: StepId,
  ) -> Result<Vec<ComponentInstance>, StoreError> {
    let sql = format!(
      "SELECT id, step_id, kind_name AS name FROM {} WHERE step_id = ? ORDER BY id ASC",
      kind.instance_table()
    );
    let rows: Vec<InstanceRow> = sqlx::query_as(&sql)
      .bind(step_id)
      .fetch_all(&self.pool)
      .await?;

    Ok(rows.into_iter().map(|row| row.into_instance(kind)).collect())
  }

  /// Delete an instance together with all of its settings.
  pub async fn delete_instance(
    &self,
    kind: ComponentKind,
    id: InstanceId,
  ) -> Result<(), StoreError> {
    let mut tx = self.begin_write().await?;

    sqlx::query("DELETE FROM instance_setting WHERE component_kind = ? AND instance_id = ?")
      .bind(kind)
      .bind(id)
      .execute(&mut *tx)
      .await?;

    let sql = format!("DELETE FROM {} WHERE id = ?", kind.instance_table());
    let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(format!("{kind} instance {id}")));
    }

    tx.commit().await?;
    Ok(())
  }

  async fn try_set_setting(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
    value: Option<&str>,
  ) -> Result<(), sqlx::Error> {
    let mut tx = self.begin_write().await?;

    let current: Option<i64> = sqlx::query_scalar(
      "SELECT id FROM instance_setting WHERE component_kind = ? AND instance_id = ? AND key = ?",
    )
    .bind(kind)
    .bind(instance_id)
    .bind(key)
    .fetch_optional(&mut *tx)
    .await?;

    match (current, value) {
      (None, Some(value)) => {
        sqlx::query(
          "INSERT INTO instance_setting (component_kind, instance_id, key, value) VALUES (?, ?, ?, ?)",
        )
        .bind(kind)
        .bind(instance_id)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
      }
      (Some(id), Some(value)) => {
        sqlx::query("UPDATE instance_setting SET value = ? WHERE id = ?")
          .bind(value)
          .bind(id)
          .execute(&mut *tx)
          .await?;
      }
      (Some(id), None) => {
        sqlx::query("DELETE FROM instance_setting WHERE id = ?")
          .bind(id)
          .execute(&mut *tx)
          .await?;
      }
      (None, None) => {}
    }

    tx.commit().await
  }

  // ---------------------------------------------------------------------------
  // Processes
  // ---------------------------------------------------------------------------

  pub async fn get_process(&self, id: ProcessId) -> Result<Option<Process>, StoreError> {
    let process = sqlx::query_as(
      r#"
            SELECT p.id, p.subject_id, p.step_id, s.workflow_id, p.finished, p.created_at, p.modified_at
            FROM process p
            JOIN step s ON s.id = p.step_id
            WHERE p.id = ?
            "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(process)
  }

  /// List the processes of a subject, oldest first.
  pub async fn list_processes_for_subject(
    &self,
    subject: SubjectId,
    include_finished: bool,
  ) -> Result<Vec<Process>, StoreError> {
    let processes = sqlx::query_as(
      r#"
            SELECT p.id, p.subject_id, p.step_id, s.workflow_id, p.finished, p.created_at, p.modified_at
            FROM process p
            JOIN step s ON s.id = p.step_id
            WHERE p.subject_id = ? AND (? OR p.finished = 0)
            ORDER BY p.id ASC
            "#,
    )
    .bind(subject)
    .bind(include_finished)
    .fetch_all(&self.pool)
    .await?;

    Ok(processes)
  }

  /// List the unfinished processes currently at a step.
  pub async fn list_active_processes_for_step(
    &self,
    step_id: StepId,
  ) -> Result<Vec<Process>, StoreError> {
    let processes = sqlx::query_as(
      r#"
            SELECT p.id, p.subject_id, p.step_id, s.workflow_id, p.finished, p.created_at, p.modified_at
            FROM process p
            JOIN step s ON s.id = p.step_id
            WHERE p.step_id = ? AND p.finished = 0
            ORDER BY p.id ASC
            "#,
    )
    .bind(step_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(processes)
  }

  /// Move an unfinished process to another step and record whether it is
  /// finished.
  ///
  /// Fails with [`StoreError::Conflict`] when the stored process is already
  /// finished.
  pub async fn update_process_step(
    &self,
    id: ProcessId,
    step_id: StepId,
    finished: bool,
    now: DateTime<Utc>,
  ) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            UPDATE process
            SET step_id = ?, finished = ?, modified_at = ?
            WHERE id = ? AND finished = 0
            "#,
    )
    .bind(step_id)
    .bind(finished)
    .bind(now)
    .bind(id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM process WHERE id = ?)")
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
      return Err(if exists {
        StoreError::Conflict(format!("process {id} is already finished"))
      } else {
        StoreError::NotFound(format!("process {id}"))
      });
    }
    Ok(())
  }

  /// Begin a transaction for creating a process.
  ///
  /// The transaction holds the database write lock until it ends, so a
  /// concurrent creation for the same subject waits and then sees the
  /// committed row.
  pub async fn begin_process(&self) -> Result<ProcessTransaction, StoreError> {
    let tx = with_retry("process creation", move || self.begin_write()).await?;
    Ok(ProcessTransaction { tx })
  }
}

/// Run `op` until it succeeds, fails for a reason other than contention, or
/// runs out of attempts.
async fn with_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T, StoreError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, sqlx::Error>>,
{
  let mut attempt = 1;
  loop {
    match op().await {
      Err(e) if StoreError::is_contended(&e) && attempt < MAX_WRITE_ATTEMPTS => {
        warn!(operation, attempt, error = %e, "write raced another writer, retrying");
        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        attempt += 1;
      }
      result => return result.map_err(StoreError::from),
    }
  }
}

#[async_trait]
impl SettingStore for SqliteStore {
  async fn get_all(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<BTreeMap<String, String>, StoreError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
      "SELECT key, value FROM instance_setting WHERE component_kind = ? AND instance_id = ?",
    )
    .bind(kind)
    .bind(instance_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().collect())
  }

  async fn get(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
  ) -> Result<Option<String>, StoreError> {
    let value = sqlx::query_scalar(
      "SELECT value FROM instance_setting WHERE component_kind = ? AND instance_id = ? AND key = ?",
    )
    .bind(kind)
    .bind(instance_id)
    .bind(key)
    .fetch_optional(&self.pool)
    .await?;

    Ok(value)
  }

  async fn set(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
    value: Option<&str>,
  ) -> Result<(), StoreError> {
    with_retry("setting write", move || {
      self.try_set_setting(kind, instance_id, key, value)
    })
    .await
  }

  async fn delete_all(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM instance_setting WHERE component_kind = ? AND instance_id = ?")
      .bind(kind)
      .bind(instance_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

/// Transaction scoped to the creation of a single process.
///
/// Dropping it without calling [`ProcessTransaction::commit`] rolls back.
pub struct ProcessTransaction {
  tx: Transaction<'static, Sqlite>,
}

impl ProcessTransaction {
  /// Whether the subject already has an unfinished process.
  pub async fn has_unfinished_process(&mut self, subject: SubjectId) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar(
      "SELECT EXISTS (SELECT 1 FROM process WHERE subject_id = ? AND finished = 0)",
    )
    .bind(subject)
    .fetch_one(&mut *self.tx)
    .await?;
    Ok(exists)
  }

  /// Insert a process at `step`.
  ///
  /// Fails with [`StoreError::Conflict`] when the subject already has an
  /// unfinished process.
  pub async fn insert_process(
    &mut self,
    subject: SubjectId,
    step: &Step,
    finished: bool,
    now: DateTime<Utc>,
  ) -> Result<Process, StoreError> {
    let result = sqlx::query(
      r#"
            INSERT INTO process (subject_id, step_id, finished, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
    )
    .bind(subject)
    .bind(step.id)
    .bind(finished)
    .bind(now)
    .bind(now)
    .execute(&mut *self.tx)
    .await;

    let id = match result {
      Ok(result) => result.last_insert_rowid(),
      Err(e) if StoreError::is_unique_violation(&e) => {
        return Err(StoreError::Conflict(format!(
          "subject {subject} already has an unfinished process"
        )));
      }
      Err(e) => return Err(e.into()),
    };

    Ok(Process {
      id: ProcessId(id),
      subject_id: subject,
      step_id: step.id,
      workflow_id: step.workflow_id,
      finished,
      created_at: now,
      modified_at: now,
    })
  }

  pub async fn commit(self) -> Result<(), StoreError> {
    self.tx.commit().await?;
    Ok(())
  }

  pub async fn rollback(self) -> Result<(), StoreError> {
    self.tx.rollback().await?;
    Ok(())
  }
}
