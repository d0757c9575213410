use std::collections::HashMap;
use std::sync::Arc;

use lifecycle_component::{Effect, Predicate};
use lifecycle_store::{ComponentInstance, StepId};
use tokio::sync::RwLock;

/// A predicate instance together with its resolved implementation.
#[derive(Clone)]
pub struct ResolvedPredicate {
  pub instance: ComponentInstance,
  pub predicate: Arc<dyn Predicate>,
}

/// An effect instance together with its resolved implementation.
#[derive(Clone)]
pub struct ResolvedEffect {
  pub instance: ComponentInstance,
  pub effect: Arc<dyn Effect>,
}

/// The resolved predicates and effects attached to one step, in attachment
/// order.
#[derive(Clone, Default)]
pub struct StepComponents {
  pub predicates: Vec<ResolvedPredicate>,
  pub effects: Vec<ResolvedEffect>,
}

#[derive(Default)]
struct Slot {
  version: u64,
  components: Option<Arc<StepComponents>>,
}

/// Per-step cache of resolved components.
///
/// Every invalidation bumps the step's version. A load only lands in the cache
/// if no invalidation happened since it started, so a slow reader can never
/// overwrite the cache with a stale collection.
#[derive(Default)]
pub(crate) struct StepCache {
  slots: RwLock<HashMap<StepId, Slot>>,
}

impl StepCache {
  pub(crate) async fn get(&self, step_id: StepId) -> Option<Arc<StepComponents>> {
    let slots = self.slots.read().await;
    slots.get(&step_id).and_then(|slot| slot.components.clone())
  }

  pub(crate) async fn version(&self, step_id: StepId) -> u64 {
    let slots = self.slots.read().await;
    slots.get(&step_id).map_or(0, |slot| slot.version)
  }

  /// Store `components` if the step is still at `version`. Returns whether it
  /// was stored.
  pub(crate) async fn fill(
    &self,
    step_id: StepId,
    version: u64,
    components: Arc<StepComponents>,
  ) -> bool {
    let mut slots = self.slots.write().await;
    let slot = slots.entry(step_id).or_default();
    if slot.version != version {
      return false;
    }
    slot.components = Some(components);
    true
  }

  pub(crate) async fn invalidate(&self, step_id: StepId) {
    let mut slots = self.slots.write().await;
    let slot = slots.entry(step_id).or_default();
    slot.version += 1;
    slot.components = None;
  }
}
