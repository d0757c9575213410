use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lifecycle_config::{LifecycleConfig, WorkflowDef};
use lifecycle_engine::{Context, Engine};
use lifecycle_resolver::{PluginRegistry, Resolver, StandardResolver};
use lifecycle_store::{MoveDirection, ProcessId, SqliteStore, StepId, SubjectId, WorkflowId};

/// Lifecycle - drive subject records through ordered workflows
#[derive(Parser)]
#[command(name = "lifecycle")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.lifecycle)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Database URL, overrides the config file
  #[arg(long, global = true)]
  database: Option<String>,

  /// Subject id recorded as the acting user, overrides the config file
  #[arg(long, global = true)]
  actor: Option<i64>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Manage workflows
  Workflow {
    #[command(subcommand)]
    command: WorkflowCommand,
  },

  /// Manage steps
  Step {
    #[command(subcommand)]
    command: StepCommand,
  },

  /// Start and advance processes
  Process {
    #[command(subcommand)]
    command: ProcessCommand,
  },

  /// Inspect registered plugins
  Plugin {
    #[command(subcommand)]
    command: PluginCommand,
  },
}

#[derive(Subcommand)]
enum WorkflowCommand {
  /// List all workflows in order
  List,

  /// Show a workflow with its steps and components
  Show { id: i64 },

  /// Create an inactive workflow
  Create {
    title: String,
    #[arg(long)]
    description: Option<String>,
  },

  Activate { id: i64 },

  Deactivate { id: i64 },

  /// Change the title of a workflow
  Rename { id: i64, title: String },

  /// Set or clear the description of a workflow
  Describe { id: i64, description: Option<String> },

  /// Move a workflow up or down
  Move { id: i64, direction: Direction },

  /// Import a workflow definition (JSON file, or - for stdin)
  Import { file: PathBuf },
}

#[derive(Subcommand)]
enum StepCommand {
  /// Append a step to a workflow
  Add {
    workflow_id: i64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Predicate to attach (repeatable)
    #[arg(long = "predicate")]
    predicates: Vec<String>,
    /// Effect to attach (repeatable)
    #[arg(long = "effect")]
    effects: Vec<String>,
  },

  /// Move a step up or down within its workflow
  Move { id: i64, direction: Direction },
}

#[derive(Subcommand)]
enum ProcessCommand {
  /// Start a process for a subject
  Start {
    subject: i64,
    workflow_id: i64,
    /// Initial step (default: first step)
    #[arg(long)]
    step: Option<i64>,
  },

  /// Advance a process to the next step, or to --to
  Advance {
    id: i64,
    #[arg(long)]
    to: Option<i64>,
  },

  /// List the processes of a subject
  List {
    subject: i64,
    /// Include finished processes
    #[arg(long)]
    all: bool,
  },

  Show { id: i64 },
}

#[derive(Subcommand)]
enum PluginCommand {
  /// List registered predicates and effects
  List,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
  Up,
  Down,
}

impl From<Direction> for MoveDirection {
  fn from(direction: Direction) -> Self {
    match direction {
      Direction::Up => MoveDirection::Up,
      Direction::Down => MoveDirection::Down,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let Some(command) = cli.command else {
    println!("lifecycle - use --help to see available commands");
    return Ok(());
  };

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".lifecycle"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, &data_dir, cli.database, cli.actor).await })
}

async fn run(
  command: Commands,
  data_dir: &Path,
  database: Option<String>,
  actor: Option<i64>,
) -> Result<()> {
  let config = LifecycleConfig::load(data_dir)?;

  let mut registry = PluginRegistry::with_builtins();
  registry.apply_config(&config);
  let resolver = Arc::new(StandardResolver::new(registry));

  if let Commands::Plugin {
    command: PluginCommand::List,
  } = command
  {
    let plugins: Vec<_> = resolver
      .plugins()
      .into_iter()
      .map(|p| json!({ "kind": p.kind, "name": p.name, "enabled": p.enabled }))
      .collect();
    return print_json(&plugins);
  }

  std::fs::create_dir_all(data_dir)
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
  let url = database.unwrap_or_else(|| config.database_url(data_dir));
  debug!(%url, "opening database");
  let store = SqliteStore::connect(&url)
    .await
    .with_context(|| format!("failed to open database: {url}"))?;

  let engine = Engine::new(store, resolver);
  let ctx = Context::system(SubjectId(actor.unwrap_or(config.actor_id)));

  match command {
    Commands::Workflow { command } => run_workflow(&engine, &ctx, command).await,
    Commands::Step { command } => run_step(&engine, &ctx, command).await,
    Commands::Process { command } => run_process(&engine, &ctx, command).await,
    Commands::Plugin { .. } => Ok(()),
  }
}

async fn run_workflow(engine: &Engine, ctx: &Context, command: WorkflowCommand) -> Result<()> {
  match command {
    WorkflowCommand::List => print_json(&engine.list_workflows().await?),
    WorkflowCommand::Show { id } => show_workflow(engine, WorkflowId(id)).await,
    WorkflowCommand::Create { title, description } => {
      let workflow = engine
        .create_workflow(ctx, &title, description.as_deref())
        .await?;
      print_json(&workflow)
    }
    WorkflowCommand::Activate { id } => {
      let mut workflow = engine.get_workflow(WorkflowId(id)).await?;
      engine.activate_workflow(ctx, &mut workflow).await?;
      print_json(&workflow)
    }
    WorkflowCommand::Deactivate { id } => {
      let mut workflow = engine.get_workflow(WorkflowId(id)).await?;
      engine.deactivate_workflow(ctx, &mut workflow).await?;
      print_json(&workflow)
    }
    WorkflowCommand::Rename { id, title } => {
      let mut workflow = engine.get_workflow(WorkflowId(id)).await?;
      engine.set_workflow_title(ctx, &mut workflow, &title).await?;
      print_json(&workflow)
    }
    WorkflowCommand::Describe { id, description } => {
      let mut workflow = engine.get_workflow(WorkflowId(id)).await?;
      engine
        .set_workflow_description(ctx, &mut workflow, description.as_deref())
        .await?;
      print_json(&workflow)
    }
    WorkflowCommand::Move { id, direction } => {
      let mut workflow = engine.get_workflow(WorkflowId(id)).await?;
      if !engine
        .move_workflow(ctx, &mut workflow, direction.into())
        .await?
      {
        eprintln!("Workflow {id} is already at the boundary");
      }
      print_json(&workflow)
    }
    WorkflowCommand::Import { file } => {
      let content = read_definition(&file)?;
      let def = WorkflowDef::from_json(&content)
        .with_context(|| format!("failed to parse workflow definition: {}", file.display()))?;
      let workflow = engine
        .import_workflow(ctx, &def)
        .await
        .context("failed to import workflow")?;
      eprintln!("Imported workflow {} with {} steps", workflow.id, def.steps.len());
      show_workflow(engine, workflow.id).await
    }
  }
}

async fn show_workflow(engine: &Engine, id: WorkflowId) -> Result<()> {
  let workflow = engine.get_workflow(id).await?;

  let mut steps = Vec::new();
  for step in engine.workflow_steps(id).await? {
    let components = engine.step_components(&step).await?;
    let mut predicates = Vec::new();
    for p in &components.predicates {
      let settings = engine.instance_settings(&p.instance).await?;
      predicates.push(json!({
        "id": p.instance.id,
        "name": p.instance.name,
        "settings": settings.iter().collect::<std::collections::BTreeMap<_, _>>(),
      }));
    }
    let mut effects = Vec::new();
    for e in &components.effects {
      let settings = engine.instance_settings(&e.instance).await?;
      effects.push(json!({
        "id": e.instance.id,
        "name": e.instance.name,
        "settings": settings.iter().collect::<std::collections::BTreeMap<_, _>>(),
      }));
    }
    let active = engine.active_processes_for_step(step.id).await?.len();
    steps.push(json!({
      "step": step,
      "predicates": predicates,
      "effects": effects,
      "active_processes": active,
    }));
  }

  print_json(&json!({ "workflow": workflow, "steps": steps }))
}

async fn run_step(engine: &Engine, ctx: &Context, command: StepCommand) -> Result<()> {
  match command {
    StepCommand::Add {
      workflow_id,
      title,
      description,
      predicates,
      effects,
    } => {
      let step = engine
        .create_step(
          ctx,
          WorkflowId(workflow_id),
          title.as_deref(),
          description.as_deref(),
        )
        .await?;
      for name in &predicates {
        engine.add_predicate(ctx, &step, name).await?;
      }
      for name in &effects {
        engine.add_effect(ctx, &step, name).await?;
      }
      print_json(&step)
    }
    StepCommand::Move { id, direction } => {
      let mut step = engine.get_step(StepId(id)).await?;
      if !engine.move_step(ctx, &mut step, direction.into()).await? {
        eprintln!("Step {id} is already at the boundary");
      }
      print_json(&step)
    }
  }
}

async fn run_process(engine: &Engine, ctx: &Context, command: ProcessCommand) -> Result<()> {
  match command {
    ProcessCommand::Start {
      subject,
      workflow_id,
      step,
    } => {
      let process = engine
        .create_process(ctx, SubjectId(subject), WorkflowId(workflow_id), step.map(StepId))
        .await?;
      print_json(&process)
    }
    ProcessCommand::Advance { id, to } => {
      let mut process = engine.get_process(ProcessId(id)).await?;
      let result = engine.transition(ctx, &mut process, to.map(StepId)).await;
      if let Some(failure) = result.as_ref().err().and_then(|e| e.action_failure()) {
        // The move was persisted; show where the process stands.
        print_json(&json!({ "process": process, "failure": failure }))?;
      }
      result?;
      print_json(&process)
    }
    ProcessCommand::List { subject, all } => {
      print_json(&engine.processes_for_subject(SubjectId(subject), all).await?)
    }
    ProcessCommand::Show { id } => print_json(&engine.get_process(ProcessId(id)).await?),
  }
}

fn read_definition(file: &Path) -> Result<String> {
  if file == Path::new("-") {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read workflow definition from stdin")?;
    return Ok(input);
  }
  std::fs::read_to_string(file)
    .with_context(|| format!("failed to read workflow definition: {}", file.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
