use thiserror::Error;

use crate::descriptor::SettingType;

/// Problems with an instance setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
  /// A required setting has no value and no default.
  #[error("required setting '{key}' is not set")]
  Missing { key: String },

  /// The stored value does not parse as the declared type.
  #[error("setting '{key}' expects {expected}, got '{value}'")]
  InvalidValue {
    key: String,
    expected: SettingType,
    value: String,
  },

  /// The setting is declared readonly.
  #[error("setting '{key}' is readonly")]
  ReadOnly { key: String },

  /// The component declares no setting with this key.
  #[error("unknown setting '{key}'")]
  Unknown { key: String },
}

/// Errors while building or combining selection clauses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClauseError {
  /// Two clauses bind the same parameter name to different values.
  #[error("parameter '{name}' is bound to conflicting values")]
  ConflictingParameter { name: String },

  /// The predicate's configuration prevents building its clause.
  #[error("setting error: {0}")]
  Setting(#[from] SettingError),
}

/// Faults raised by an effect.
///
/// A clean failure is reported by returning `Ok(false)` from
/// [`Effect::execute`](crate::Effect::execute); an `EffectError` means the
/// effect could not run to a verdict.
#[derive(Debug, Error)]
pub enum EffectError {
  /// The effect's configuration is unusable.
  #[error("setting error: {0}")]
  Setting(#[from] SettingError),

  /// Execution faulted.
  #[error("{0}")]
  Fault(String),
}

impl EffectError {
  pub fn fault(message: impl std::fmt::Display) -> Self {
    EffectError::Fault(message.to_string())
  }
}
