//! Engine event bus.
//!
//! In-process broadcast of engine activity so a host application can drive
//! its UI without polling. Slow subscribers lose old events rather than
//! stall the engine.

use crate::remediation::ActionOutcome;
use crate::triage::{Classification, TriageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Events published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// An analysis cycle finished.
    CycleCompleted {
        vaults: usize,
        findings: usize,
        results: usize,
    },
    /// A critical triage result was produced this cycle.
    CriticalFinding { result: TriageResult },
    /// The capture sensor went from idle to active.
    CaptureDetected { at: DateTime<Utc> },
    /// A remediation flow was opened.
    FlowStarted {
        flow_id: Uuid,
        result: TriageResult,
        auto_started: bool,
    },
    /// An active flow absorbed a re-derived result.
    FlowUpdated {
        flow_id: Uuid,
        classification: Classification,
    },
    /// An action was executed, automatically or by the owner.
    ActionExecuted {
        flow_id: Uuid,
        outcome: ActionOutcome,
    },
}

impl EngineEvent {
    /// Stable event label for logging and filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CycleCompleted { .. } => "cycle_completed",
            Self::CriticalFinding { .. } => "critical_finding",
            Self::CaptureDetected { .. } => "capture_detected",
            Self::FlowStarted { .. } => "flow_started",
            Self::FlowUpdated { .. } => "flow_updated",
            Self::ActionExecuted { .. } => "action_executed",
        }
    }
}

/// Broadcast bus for engine events.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a bus retaining up to `capacity` undelivered events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: EngineEvent) {
        debug!(event_type = event.event_type(), "engine event");
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::CycleCompleted {
            vaults: 2,
            findings: 3,
            results: 1,
        });

        let event = rx.recv().await.expect("event");
        assert_eq!(event.event_type(), "cycle_completed");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::CaptureDetected { at: Utc::now() });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
