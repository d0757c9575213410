#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lifecycle_component::{
  ClauseError, Effect, EffectError, InstanceSettings, Predicate, SelectionClause,
  SettingDescriptor, SettingType,
};
use lifecycle_engine::{ChannelNotifier, Context, Engine, FixedClock, ProcessEvent};
use lifecycle_resolver::{PluginRegistry, StandardResolver};
use lifecycle_store::{Process, SqliteStore, SubjectId, Workflow};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const ADMIN: SubjectId = SubjectId(2);

/// Stand-in for the user records effects act on.
#[derive(Default)]
pub struct SubjectDirectory {
  subjects: Mutex<BTreeSet<SubjectId>>,
}

impl SubjectDirectory {
  pub fn with_subjects(ids: impl IntoIterator<Item = i64>) -> Self {
    Self {
      subjects: Mutex::new(ids.into_iter().map(SubjectId).collect()),
    }
  }

  pub fn contains(&self, id: SubjectId) -> bool {
    self.subjects.lock().unwrap().contains(&id)
  }

  fn remove(&self, id: SubjectId) -> bool {
    self.subjects.lock().unwrap().remove(&id)
  }
}

/// Ordered record of effect executions as `name:subject`.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

pub struct DeleteSubject {
  directory: Arc<SubjectDirectory>,
  log: ExecutionLog,
}

#[async_trait]
impl Effect for DeleteSubject {
  fn name(&self) -> &str {
    "delete"
  }

  async fn execute(&self, process: &Process, _: &InstanceSettings) -> Result<bool, EffectError> {
    self
      .log
      .lock()
      .unwrap()
      .push(format!("delete:{}", process.subject_id));
    Ok(self.directory.remove(process.subject_id))
  }
}

pub struct Recording {
  name: &'static str,
  log: ExecutionLog,
}

#[async_trait]
impl Effect for Recording {
  fn name(&self) -> &str {
    self.name
  }

  async fn execute(&self, process: &Process, _: &InstanceSettings) -> Result<bool, EffectError> {
    self
      .log
      .lock()
      .unwrap()
      .push(format!("{}:{}", self.name, process.subject_id));
    Ok(true)
  }
}

/// Takes a while, like a call to a slow mail server.
pub struct Slow {
  log: ExecutionLog,
}

#[async_trait]
impl Effect for Slow {
  fn name(&self) -> &str {
    "slow"
  }

  async fn execute(&self, process: &Process, _: &InstanceSettings) -> Result<bool, EffectError> {
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    self
      .log
      .lock()
      .unwrap()
      .push(format!("slow:{}", process.subject_id));
    Ok(true)
  }
}

pub struct Decline;

#[async_trait]
impl Effect for Decline {
  fn name(&self) -> &str {
    "decline"
  }

  async fn execute(&self, _: &Process, _: &InstanceSettings) -> Result<bool, EffectError> {
    Ok(false)
  }
}

pub struct Fault;

#[async_trait]
impl Effect for Fault {
  fn name(&self) -> &str {
    "fault"
  }

  async fn execute(&self, _: &Process, _: &InstanceSettings) -> Result<bool, EffectError> {
    Err(EffectError::fault("mail server unreachable"))
  }
}

/// Effect with a full settings schema.
pub struct Mail {
  log: ExecutionLog,
}

#[async_trait]
impl Effect for Mail {
  fn name(&self) -> &str {
    "mail"
  }

  fn setting_descriptors(&self) -> Vec<SettingDescriptor> {
    vec![
      SettingDescriptor::new("subject", SettingType::Text).required(),
      SettingDescriptor::new("copy_admin", SettingType::Bool).with_default("false"),
      SettingDescriptor::new("template", SettingType::Text)
        .with_default("default")
        .readonly(),
    ]
  }

  async fn execute(
    &self,
    process: &Process,
    settings: &InstanceSettings,
  ) -> Result<bool, EffectError> {
    let subject = settings.require("subject")?;
    self
      .log
      .lock()
      .unwrap()
      .push(format!("mail:{}:{subject}", process.subject_id));
    Ok(true)
  }
}

pub struct InactiveFor;

impl Predicate for InactiveFor {
  fn name(&self) -> &str {
    "inactive_for"
  }

  fn setting_descriptors(&self) -> Vec<SettingDescriptor> {
    vec![SettingDescriptor::new("days", SettingType::Int).required()]
  }

  fn selection_clause(&self, settings: &InstanceSettings) -> Result<SelectionClause, ClauseError> {
    let days = settings.get_int("days")?.unwrap_or_default();
    Ok(SelectionClause::new("lastaccess < :cutoff").with_param("cutoff", days * 86_400))
  }
}

pub struct NotSuspended;

impl Predicate for NotSuspended {
  fn name(&self) -> &str {
    "not_suspended"
  }

  fn selection_clause(&self, _: &InstanceSettings) -> Result<SelectionClause, ClauseError> {
    Ok(SelectionClause::new("suspended = :suspended").with_param("suspended", false))
  }
}

pub struct Harness {
  pub engine: Engine,
  pub ctx: Context,
  pub clock: Arc<FixedClock>,
  pub directory: Arc<SubjectDirectory>,
  pub log: ExecutionLog,
  pub events: mpsc::UnboundedReceiver<ProcessEvent>,
  _dir: TempDir,
}

impl Harness {
  pub async fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("lifecycle.db").display());
    let store = SqliteStore::connect(&url).await.unwrap();

    let directory = Arc::new(SubjectDirectory::with_subjects([41, 42, 43]));
    let log = ExecutionLog::default();

    let mut registry = PluginRegistry::with_builtins();
    {
      let directory = directory.clone();
      let log = log.clone();
      registry.register_effect("delete", move || DeleteSubject {
        directory: directory.clone(),
        log: log.clone(),
      });
    }
    for name in ["warn", "suspend"] {
      let log = log.clone();
      registry.register_effect(name, move || Recording {
        name,
        log: log.clone(),
      });
    }
    {
      let log = log.clone();
      registry.register_effect("mail", move || Mail { log: log.clone() });
    }
    {
      let log = log.clone();
      registry.register_effect("slow", move || Slow { log: log.clone() });
    }
    registry.register_effect("decline", || Decline);
    registry.register_effect("fault", || Fault);
    registry.register_predicate("inactive_for", || InactiveFor);
    registry.register_predicate("not_suspended", || NotSuspended);

    let (tx, events) = mpsc::unbounded_channel();
    let engine = Engine::new(store, Arc::new(StandardResolver::new(registry)))
      .with_notifier(Arc::new(ChannelNotifier::new(tx)));

    let clock = Arc::new(FixedClock::new(
      Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap(),
    ));
    let ctx = Context::new(ADMIN, clock.clone());

    Self {
      engine,
      ctx,
      clock,
      directory,
      log,
      events,
      _dir: dir,
    }
  }

  /// An active workflow with one step per effect list; `&[]` adds a step
  /// without effects.
  pub async fn workflow(&self, title: &str, steps: &[&[&str]]) -> Workflow {
    let mut workflow = self
      .engine
      .create_workflow(&self.ctx, title, None)
      .await
      .unwrap();
    for effects in steps {
      let step = self
        .engine
        .create_step(&self.ctx, workflow.id, None, None)
        .await
        .unwrap();
      for effect in *effects {
        self.engine.add_effect(&self.ctx, &step, effect).await.unwrap();
      }
    }
    self
      .engine
      .activate_workflow(&self.ctx, &mut workflow)
      .await
      .unwrap();
    workflow
  }

  pub fn executions(&self) -> Vec<String> {
    self.log.lock().unwrap().clone()
  }

  pub fn drain_events(&mut self) -> Vec<ProcessEvent> {
    let mut events = Vec::new();
    while let Ok(event) = self.events.try_recv() {
      events.push(event);
    }
    events
  }
}
