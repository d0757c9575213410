use std::sync::Arc;

use lifecycle_component::{Effect, InstanceSettings, validate_settings};
use lifecycle_resolver::Resolver;
use lifecycle_store::{ComponentInstance, ComponentKind, Process, SqliteStore, Step};
use tracing::{error, info};

use crate::cache::{ResolvedEffect, StepCache};
use crate::error::{ActionFailure, EngineError, FailureReason};
use crate::events::{NoopNotifier, ProcessEvent, ProcessNotifier};

/// The workflow engine.
///
/// Operations are split by record type: workflows, steps, component instances
/// and processes. Mutating operations take a [`Context`](crate::Context)
/// carrying the acting subject and the clock.
pub struct Engine {
  pub(crate) store: SqliteStore,
  pub(crate) resolver: Arc<dyn Resolver>,
  pub(crate) notifier: Arc<dyn ProcessNotifier>,
  pub(crate) cache: StepCache,
}

/// An effect ready to run, with its settings loaded and validated.
pub(crate) struct PreparedEffect {
  pub(crate) instance: ComponentInstance,
  pub(crate) effect: Arc<dyn Effect>,
  pub(crate) settings: InstanceSettings,
}

impl Engine {
  pub fn new(store: SqliteStore, resolver: Arc<dyn Resolver>) -> Self {
    Self {
      store,
      resolver,
      notifier: Arc::new(NoopNotifier),
      cache: StepCache::default(),
    }
  }

  /// Set the notifier receiving process events.
  pub fn with_notifier(mut self, notifier: Arc<dyn ProcessNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn store(&self) -> &SqliteStore {
    &self.store
  }

  pub fn resolver(&self) -> &dyn Resolver {
    self.resolver.as_ref()
  }

  /// Load and validate the settings of every effect of a step.
  ///
  /// Runs before any process state is written so a misconfigured step fails
  /// without side effects.
  pub(crate) async fn prepare_effects(
    &self,
    step: &Step,
  ) -> Result<Vec<PreparedEffect>, EngineError> {
    let components = self.step_components(step).await?;
    let mut prepared = Vec::with_capacity(components.effects.len());

    for ResolvedEffect { instance, effect } in components.effects.iter().cloned() {
      let descriptors = effect.setting_descriptors();
      let settings =
        InstanceSettings::load(&self.store, ComponentKind::Effect, instance.id, &descriptors)
          .await?;
      let problems = validate_settings(&settings, &descriptors);
      if !problems.is_empty() {
        return Err(EngineError::InvalidSettings {
          kind: ComponentKind::Effect,
          instance_id: instance.id,
          problems,
        });
      }
      prepared.push(PreparedEffect {
        instance,
        effect,
        settings,
      });
    }

    Ok(prepared)
  }

  /// Run effects in order, stopping at the first failure.
  pub(crate) async fn run_effects(
    &self,
    process: &Process,
    effects: &[PreparedEffect],
  ) -> Result<(), ActionFailure> {
    let mut executed = Vec::new();

    for prepared in effects {
      let name = prepared.effect.name().to_string();
      let outcome = prepared
        .effect
        .execute(process, &prepared.settings)
        .await;

      let reason = match outcome {
        Ok(true) => {
          info!(process_id = %process.id, effect = %name, instance_id = %prepared.instance.id, "effect executed");
          self.notifier.notify(ProcessEvent::EffectExecuted {
            process_id: process.id,
            step_id: process.step_id,
            instance_id: prepared.instance.id,
            effect: name.clone(),
          });
          executed.push(name);
          continue;
        }
        Ok(false) => FailureReason::Declined,
        Err(e) => FailureReason::Fault(e.to_string()),
      };

      error!(process_id = %process.id, effect = %name, instance_id = %prepared.instance.id, %reason, "effect failed");
      self.notifier.notify(ProcessEvent::EffectFailed {
        process_id: process.id,
        step_id: process.step_id,
        instance_id: prepared.instance.id,
        effect: name.clone(),
        error: reason.to_string(),
      });

      return Err(ActionFailure {
        process_id: Some(process.id),
        subject_id: process.subject_id,
        step_id: process.step_id,
        effect: name,
        instance_id: prepared.instance.id,
        reason,
        executed,
      });
    }

    Ok(())
  }
}
