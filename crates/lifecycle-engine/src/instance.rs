use lifecycle_component::{
  InstanceSettings, SettingDescriptor, SettingError, validate_settings,
};
use lifecycle_resolver::Resolver;
use lifecycle_store::{ComponentInstance, ComponentKind, InstanceId, SettingStore, Step};
use tracing::{info, instrument};

use crate::context::Context;
use crate::engine::Engine;
use crate::error::EngineError;

impl Engine {
  /// Attach a predicate to a step. The name must resolve to an enabled
  /// predicate.
  pub async fn add_predicate(
    &self,
    ctx: &Context,
    step: &Step,
    name: &str,
  ) -> Result<ComponentInstance, EngineError> {
    self.resolver.resolve_predicate(name)?;
    self.add_instance(ctx, step, ComponentKind::Predicate, name).await
  }

  /// Attach an effect to a step. The name must resolve to an enabled effect.
  pub async fn add_effect(
    &self,
    ctx: &Context,
    step: &Step,
    name: &str,
  ) -> Result<ComponentInstance, EngineError> {
    self.resolver.resolve_effect(name)?;
    self.add_instance(ctx, step, ComponentKind::Effect, name).await
  }

  pub async fn remove_predicate(
    &self,
    ctx: &Context,
    step: &Step,
    instance_id: InstanceId,
  ) -> Result<(), EngineError> {
    self
      .remove_instance(ctx, step, ComponentKind::Predicate, instance_id)
      .await
  }

  pub async fn remove_effect(
    &self,
    ctx: &Context,
    step: &Step,
    instance_id: InstanceId,
  ) -> Result<(), EngineError> {
    self
      .remove_instance(ctx, step, ComponentKind::Effect, instance_id)
      .await
  }

  #[instrument(skip_all, fields(step_id = %step.id, kind = %kind, name = %name))]
  async fn add_instance(
    &self,
    ctx: &Context,
    step: &Step,
    kind: ComponentKind,
    name: &str,
  ) -> Result<ComponentInstance, EngineError> {
    let instance = self.store.create_instance(kind, step.id, name).await?;
    self.touch_step(ctx, step).await?;
    info!(instance_id = %instance.id, "attached instance");
    Ok(instance)
  }

  #[instrument(skip_all, fields(step_id = %step.id, kind = %kind, instance_id = %instance_id))]
  async fn remove_instance(
    &self,
    ctx: &Context,
    step: &Step,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<(), EngineError> {
    let instance = self.get_instance(kind, instance_id).await?;
    if instance.step_id != step.id {
      return Err(EngineError::InstanceNotFound { kind, instance_id });
    }

    self.store.delete_instance(kind, instance_id).await?;
    self.touch_step(ctx, step).await?;
    info!("removed instance");
    Ok(())
  }

  pub async fn get_instance(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<ComponentInstance, EngineError> {
    self
      .store
      .get_instance(kind, instance_id)
      .await?
      .ok_or(EngineError::InstanceNotFound { kind, instance_id })
  }

  /// Setting descriptors of the plugin an instance resolves to.
  pub fn instance_descriptors(
    &self,
    instance: &ComponentInstance,
  ) -> Result<Vec<SettingDescriptor>, EngineError> {
    Ok(
      self
        .resolver
        .resolve(instance.kind, &instance.name)?
        .setting_descriptors(),
    )
  }

  /// The effective settings of an instance, defaults included.
  pub async fn instance_settings(
    &self,
    instance: &ComponentInstance,
  ) -> Result<InstanceSettings, EngineError> {
    let descriptors = self.instance_descriptors(instance)?;
    Ok(InstanceSettings::load(&self.store, instance.kind, instance.id, &descriptors).await?)
  }

  /// The stored value of one setting, `None` when unset. Defaults are not
  /// applied; see [`Engine::instance_settings`].
  pub async fn get_instance_setting(
    &self,
    instance: &ComponentInstance,
    key: &str,
  ) -> Result<Option<String>, EngineError> {
    Ok(self.store.get(instance.kind, instance.id, key).await?)
  }

  /// Write a setting. `None` removes the stored value.
  ///
  /// The key must be declared by the plugin, must not be readonly and the
  /// value must parse as the declared type.
  #[instrument(skip_all, fields(kind = %instance.kind, instance_id = %instance.id, key = %key))]
  pub async fn set_instance_setting(
    &self,
    ctx: &Context,
    instance: &ComponentInstance,
    key: &str,
    value: Option<&str>,
  ) -> Result<(), EngineError> {
    let descriptors = self.instance_descriptors(instance)?;
    let invalid = |source| EngineError::InvalidSetting {
      kind: instance.kind,
      instance_id: instance.id,
      source,
    };

    let descriptor = descriptors
      .iter()
      .find(|d| d.key == key)
      .ok_or_else(|| {
        invalid(SettingError::Unknown {
          key: key.to_string(),
        })
      })?;
    descriptor.check_writable(value).map_err(invalid)?;

    self.store.set(instance.kind, instance.id, key, value).await?;
    self.touch_instance_step(ctx, instance).await
  }

  /// Remove every stored setting of an instance.
  pub async fn delete_all_instance_settings(
    &self,
    ctx: &Context,
    instance: &ComponentInstance,
  ) -> Result<(), EngineError> {
    self.store.delete_all(instance.kind, instance.id).await?;
    self.touch_instance_step(ctx, instance).await
  }

  /// Problems with the effective settings of an instance; empty when valid.
  pub async fn validate_instance_settings(
    &self,
    instance: &ComponentInstance,
  ) -> Result<Vec<SettingError>, EngineError> {
    let descriptors = self.instance_descriptors(instance)?;
    let settings =
      InstanceSettings::load(&self.store, instance.kind, instance.id, &descriptors).await?;
    Ok(validate_settings(&settings, &descriptors))
  }

  async fn touch_instance_step(
    &self,
    ctx: &Context,
    instance: &ComponentInstance,
  ) -> Result<(), EngineError> {
    let step = self.get_step(instance.step_id).await?;
    self.touch_step(ctx, &step).await
  }
}
