use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SettingError;

/// Value type of an instance setting. Settings are persisted as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
  Text,
  Int,
  Bool,
}

impl SettingType {
  /// Whether `value` parses as this type.
  pub fn accepts(&self, value: &str) -> bool {
    match self {
      SettingType::Text => true,
      SettingType::Int => value.trim().parse::<i64>().is_ok(),
      SettingType::Bool => parse_bool(value).is_some(),
    }
  }
}

impl fmt::Display for SettingType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SettingType::Text => "text",
      SettingType::Int => "int",
      SettingType::Bool => "bool",
    })
  }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
  match value.trim() {
    "1" | "true" => Some(true),
    "0" | "false" => Some(false),
    _ => None,
  }
}

/// Describes one setting a component instance exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDescriptor {
  pub key: String,
  pub value_type: SettingType,
  /// Must resolve to a value (stored or default) for every instance.
  pub required: bool,
  pub default: Option<String>,
  /// Cannot be changed; the default is the only value.
  pub readonly: bool,
}

impl SettingDescriptor {
  pub fn new(key: impl Into<String>, value_type: SettingType) -> Self {
    Self {
      key: key.into(),
      value_type,
      required: false,
      default: None,
      readonly: false,
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn with_default(mut self, default: impl Into<String>) -> Self {
    self.default = Some(default.into());
    self
  }

  pub fn readonly(mut self) -> Self {
    self.readonly = true;
    self
  }

  /// Check that `value` may be written to this setting.
  pub fn check_writable(&self, value: Option<&str>) -> Result<(), SettingError> {
    if self.readonly {
      return Err(SettingError::ReadOnly {
        key: self.key.clone(),
      });
    }
    match value {
      Some(value) if !self.value_type.accepts(value) => Err(SettingError::InvalidValue {
        key: self.key.clone(),
        expected: self.value_type,
        value: value.to_string(),
      }),
      _ => Ok(()),
    }
  }
}
