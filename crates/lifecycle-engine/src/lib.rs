//! Lifecycle Engine
//!
//! Drives subjects through ordered workflows:
//!
//! ```text
//! Workflow ──< Step ──< predicate / effect instances ──< settings
//!                │
//!                └──< Process (one unfinished per subject)
//! ```
//!
//! - Workflows and steps are ordered by gapless sort indices and reordered by
//!   pairwise swaps.
//! - A process records which step a subject occupies. Creating a process or
//!   moving it to another step runs the effects of that step in attachment
//!   order. A process is finished once a transition reaches the final step.
//! - Predicates of a step describe which subjects may enter it. Evaluating
//!   them against the subject population is left to the orchestrator, which
//!   obtains the combined clause from [`Engine::step_selection_clause`].
//!
//! # Failure policy
//!
//! - Validation and state errors are raised before anything is written.
//! - [`Engine::create_process`] runs effects inside the creating transaction
//!   and rolls the process back if one fails.
//! - [`Engine::transition`] persists the move first and then runs effects. A
//!   failing effect stops the rest and is reported with the effects that
//!   already ran; the process stays at the new step.
//!
//! # Usage
//!
//! ```ignore
//! let store = SqliteStore::connect("sqlite://lifecycle.db").await?;
//! let resolver = Arc::new(StandardResolver::new(PluginRegistry::with_builtins()));
//! let engine = Engine::new(store, resolver);
//! let ctx = Context::system(SubjectId(2));
//!
//! let mut workflow = engine.create_workflow(&ctx, "Inactive users", None).await?;
//! let step = engine.create_step(&ctx, workflow.id, Some("warn"), None).await?;
//! engine.add_effect(&ctx, &step, "noop").await?;
//! engine.activate_workflow(&ctx, &mut workflow).await?;
//!
//! let mut process = engine.create_process(&ctx, SubjectId(42), workflow.id, None).await?;
//! ```

mod cache;
mod context;
mod engine;
mod error;
mod events;
mod import;
mod instance;
mod process;
mod step;
mod workflow;

pub use cache::{ResolvedEffect, ResolvedPredicate, StepComponents};
pub use context::{Clock, Context, FixedClock, SystemClock};
pub use engine::Engine;
pub use error::{ActionFailure, EngineError, ErrorKind, FailureReason};
pub use events::{ChannelNotifier, NoopNotifier, ProcessEvent, ProcessNotifier};
