use std::collections::BTreeMap;

use lifecycle_store::{ComponentKind, InstanceId, SettingStore, StoreError};

use crate::descriptor::{SettingDescriptor, SettingType, parse_bool};
use crate::error::SettingError;

/// The effective settings of one component instance: stored values overlaid
/// on descriptor defaults.
///
/// Readonly settings always carry their default. Stored keys without a
/// descriptor are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSettings {
  values: BTreeMap<String, String>,
}

impl InstanceSettings {
  pub fn resolve(mut stored: BTreeMap<String, String>, descriptors: &[SettingDescriptor]) -> Self {
    for descriptor in descriptors {
      if descriptor.readonly {
        stored.remove(&descriptor.key);
      }
      if let Some(default) = &descriptor.default {
        stored
          .entry(descriptor.key.clone())
          .or_insert_with(|| default.clone());
      }
    }
    Self { values: stored }
  }

  /// Load and resolve the settings of an instance.
  pub async fn load(
    store: &dyn SettingStore,
    kind: ComponentKind,
    instance_id: InstanceId,
    descriptors: &[SettingDescriptor],
  ) -> Result<Self, StoreError> {
    let stored = store.get_all(kind, instance_id).await?;
    Ok(Self::resolve(stored, descriptors))
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  /// Value of a setting that must be present.
  pub fn require(&self, key: &str) -> Result<&str, SettingError> {
    self.get(key).ok_or_else(|| SettingError::Missing {
      key: key.to_string(),
    })
  }

  pub fn get_int(&self, key: &str) -> Result<Option<i64>, SettingError> {
    self
      .get(key)
      .map(|value| {
        value
          .trim()
          .parse::<i64>()
          .map_err(|_| invalid(key, SettingType::Int, value))
      })
      .transpose()
  }

  pub fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingError> {
    self
      .get(key)
      .map(|value| parse_bool(value).ok_or_else(|| invalid(key, SettingType::Bool, value)))
      .transpose()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

fn invalid(key: &str, expected: SettingType, value: &str) -> SettingError {
  SettingError::InvalidValue {
    key: key.to_string(),
    expected,
    value: value.to_string(),
  }
}

/// Report every descriptor the resolved settings violate: required settings
/// without a value and values that do not parse as the declared type.
pub fn validate_settings(
  settings: &InstanceSettings,
  descriptors: &[SettingDescriptor],
) -> Vec<SettingError> {
  descriptors
    .iter()
    .filter_map(|descriptor| match settings.get(&descriptor.key) {
      None if descriptor.required => Some(SettingError::Missing {
        key: descriptor.key.clone(),
      }),
      Some(value) if !descriptor.value_type.accepts(value) => {
        Some(invalid(&descriptor.key, descriptor.value_type, value))
      }
      _ => None,
    })
    .collect()
}
