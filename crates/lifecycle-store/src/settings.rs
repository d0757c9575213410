use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::StoreError;
use crate::types::{ComponentKind, InstanceId};

/// Key/value configuration scoped by `(component kind, instance id, key)`.
///
/// Absence of an entry is the "unset" state, distinct from an empty string.
#[async_trait]
pub trait SettingStore: Send + Sync {
  /// All settings of one instance.
  async fn get_all(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<BTreeMap<String, String>, StoreError>;

  /// A single setting, `None` when unset.
  async fn get(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
  ) -> Result<Option<String>, StoreError>;

  /// Upsert a setting. `None` deletes the entry.
  async fn set(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
    value: Option<&str>,
  ) -> Result<(), StoreError>;

  /// Remove every setting of one instance.
  async fn delete_all(&self, kind: ComponentKind, instance_id: InstanceId)
  -> Result<(), StoreError>;
}

/// In-memory setting store.
///
/// Suitable for testing plugins without a database.
#[derive(Debug, Default)]
pub struct InMemorySettingStore {
  data: RwLock<HashMap<(ComponentKind, InstanceId), BTreeMap<String, String>>>,
}

impl InMemorySettingStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl SettingStore for InMemorySettingStore {
  async fn get_all(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<BTreeMap<String, String>, StoreError> {
    let data = self.data.read().await;
    Ok(data.get(&(kind, instance_id)).cloned().unwrap_or_default())
  }

  async fn get(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
  ) -> Result<Option<String>, StoreError> {
    let data = self.data.read().await;
    Ok(
      data
        .get(&(kind, instance_id))
        .and_then(|settings| settings.get(key))
        .cloned(),
    )
  }

  async fn set(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
    key: &str,
    value: Option<&str>,
  ) -> Result<(), StoreError> {
    let mut data = self.data.write().await;
    match value {
      Some(value) => {
        data
          .entry((kind, instance_id))
          .or_default()
          .insert(key.to_string(), value.to_string());
      }
      None => {
        if let Some(settings) = data.get_mut(&(kind, instance_id)) {
          settings.remove(key);
        }
      }
    }
    Ok(())
  }

  async fn delete_all(
    &self,
    kind: ComponentKind,
    instance_id: InstanceId,
  ) -> Result<(), StoreError> {
    self.data.write().await.remove(&(kind, instance_id));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_in_memory_setting_store() {
    let store = InMemorySettingStore::new();
    let kind = ComponentKind::Effect;
    let id = InstanceId(1);

    assert_eq!(store.get(kind, id, "subject").await.unwrap(), None);

    store.set(kind, id, "subject", Some("Hello")).await.unwrap();
    assert_eq!(
      store.get(kind, id, "subject").await.unwrap(),
      Some("Hello".to_string())
    );

    // Empty string is a value, not "unset".
    store.set(kind, id, "body", Some("")).await.unwrap();
    assert_eq!(store.get(kind, id, "body").await.unwrap(), Some(String::new()));

    store.set(kind, id, "subject", None).await.unwrap();
    assert_eq!(store.get(kind, id, "subject").await.unwrap(), None);

    store.delete_all(kind, id).await.unwrap();
    assert!(store.get_all(kind, id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_in_memory_scopes_by_kind() {
    let store = InMemorySettingStore::new();
    store
      .set(ComponentKind::Predicate, InstanceId(1), "k", Some("p"))
      .await
      .unwrap();
    store
      .set(ComponentKind::Effect, InstanceId(1), "k", Some("e"))
      .await
      .unwrap();

    assert_eq!(
      store.get(ComponentKind::Predicate, InstanceId(1), "k").await.unwrap(),
      Some("p".to_string())
    );
    assert_eq!(
      store.get(ComponentKind::Effect, InstanceId(1), "k").await.unwrap(),
      Some("e".to_string())
    );
  }
}
