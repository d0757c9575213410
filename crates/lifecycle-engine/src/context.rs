use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use lifecycle_store::SubjectId;

/// Source of the current time.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
  now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(now),
    }
  }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
  }

  pub fn advance(&self, by: chrono::Duration) {
    let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
    *now += by;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Who is acting and when. Passed to every mutating engine operation and
/// recorded in audit fields.
#[derive(Clone)]
pub struct Context {
  pub actor: SubjectId,
  clock: Arc<dyn Clock>,
}

impl Context {
  pub fn new(actor: SubjectId, clock: Arc<dyn Clock>) -> Self {
    Self { actor, clock }
  }

  /// Context using the system clock.
  pub fn system(actor: SubjectId) -> Self {
    Self::new(actor, Arc::new(SystemClock))
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }
}

impl std::fmt::Debug for Context {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Context")
      .field("actor", &self.actor)
      .finish_non_exhaustive()
  }
}
