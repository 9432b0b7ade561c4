use crate::context::ExecutionStatus;
use crate::error::EventError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted during workflow execution, in visitation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EngineEvent {
    #[serde(rename = "workflow:started")]
    WorkflowStarted {
        run_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "workflow:finished")]
    WorkflowFinished {
        run_id: String,
        status: ExecutionStatus,
        elapsed_s: f64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node:started")]
    NodeStarted {
        node_id: String,
        node_type: String,
        label: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node:finished")]
    NodeFinished {
        node_id: String,
        elapsed_s: f64,
        summary: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        pinned: bool,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node:error")]
    NodeError {
        node_id: String,
        error: String,
        elapsed_s: f64,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "node:skipped")]
    NodeSkipped {
        node_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// The `event` tag this variant serializes under.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::WorkflowStarted { .. } => "workflow:started",
            EngineEvent::WorkflowFinished { .. } => "workflow:finished",
            EngineEvent::NodeStarted { .. } => "node:started",
            EngineEvent::NodeFinished { .. } => "node:finished",
            EngineEvent::NodeError { .. } => "node:error",
            EngineEvent::NodeSkipped { .. } => "node:skipped",
        }
    }

    /// Node the event concerns; empty for workflow-level events.
    pub fn node_id(&self) -> &str {
        match self {
            EngineEvent::WorkflowStarted { .. } | EngineEvent::WorkflowFinished { .. } => "",
            EngineEvent::NodeStarted { node_id, .. }
            | EngineEvent::NodeFinished { node_id, .. }
            | EngineEvent::NodeError { node_id, .. }
            | EngineEvent::NodeSkipped { node_id, .. } => node_id,
        }
    }
}

/// Receives events synchronously from inside the engine loop.
///
/// The engine logs a sink failure and moves on; it must never abort a run.
/// Implementations should therefore be quick and non-blocking.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent) -> Result<(), EventError>;
}

/// Broadcast-backed event fan-out for live consumers (CLI printer,
/// WebSocket relays). Dropping events when no receiver is subscribed is
/// fine; the engine does not depend on delivery.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: &EngineEvent) -> Result<(), EventError> {
        // A send error only means there are no subscribers right now.
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
