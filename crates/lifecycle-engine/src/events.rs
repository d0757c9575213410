//! Process events and notifiers for observability.
//!
//! Events are emitted as processes are created and advanced so consumers can
//! audit, stream or test process progress without polling the database.

use lifecycle_store::{InstanceId, ProcessId, StepId, SubjectId, WorkflowId};
use serde::Serialize;
use tokio::sync::mpsc;

/// Events emitted during process lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessEvent {
  /// A process was created and committed. New processes are never finished.
  Created {
    process_id: ProcessId,
    subject_id: SubjectId,
    workflow_id: WorkflowId,
    step_id: StepId,
  },

  /// A process moved to another step. Emitted once the move is persisted,
  /// before the step's effects run.
  Transitioned {
    process_id: ProcessId,
    from_step: StepId,
    to_step: StepId,
    finished: bool,
  },

  /// An effect succeeded.
  EffectExecuted {
    process_id: ProcessId,
    step_id: StepId,
    instance_id: InstanceId,
    effect: String,
  },

  /// An effect declined or faulted.
  EffectFailed {
    process_id: ProcessId,
    step_id: StepId,
    instance_id: InstanceId,
    effect: String,
    error: String,
  },
}

/// Receives process events.
///
/// The engine calls `notify` inline; implementations must not block.
pub trait ProcessNotifier: Send + Sync {
  fn notify(&self, event: ProcessEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ProcessNotifier for NoopNotifier {
  fn notify(&self, _event: ProcessEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ProcessEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ProcessEvent>) -> Self {
    Self { sender }
  }
}

impl ProcessNotifier for ChannelNotifier {
  fn notify(&self, event: ProcessEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_event_serializes_tagged() {
    let event = ProcessEvent::Transitioned {
      process_id: ProcessId(1),
      from_step: StepId(1),
      to_step: StepId(2),
      finished: true,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "transitioned");
    assert_eq!(json["to_step"], 2);
  }

  #[test]
  fn test_channel_notifier_survives_dropped_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    drop(rx);
    notifier.notify(ProcessEvent::Created {
      process_id: ProcessId(1),
      subject_id: SubjectId(1),
      workflow_id: WorkflowId(1),
      step_id: StepId(1),
    });
  }
}
