use async_trait::async_trait;
use lifecycle_store::Process;
use tracing::debug;

use crate::capability::Effect;
use crate::error::EffectError;
use crate::settings::InstanceSettings;

/// Effect that does nothing and always succeeds. Useful for steps that only
/// mark progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEffect;

impl NoopEffect {
  pub const NAME: &'static str = "noop";
}

#[async_trait]
impl Effect for NoopEffect {
  fn name(&self) -> &str {
    Self::NAME
  }

  async fn execute(
    &self,
    process: &Process,
    _settings: &InstanceSettings,
  ) -> Result<bool, EffectError> {
    debug!(process_id = %process.id, subject = %process.subject_id, "noop effect");
    Ok(true)
  }
}
