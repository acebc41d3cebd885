//! Domain event system. Observe agent loops without coupling to them.
//!
//! The loop publishes an event for every round, step and tool call.
//! The CLI uses them to print live traces; anything else can subscribe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A round is about to call the reasoning engine
    RoundStarted {
        conversation_id: String,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// A step was parsed and appended to the log
    StepReceived {
        conversation_id: String,
        round: u32,
        kind: String,
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        conversation_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The loop produced an answer
    RequestCompleted {
        conversation_id: String,
        rounds: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// The loop terminated with an error
    RequestFailed {
        conversation_id: String,
        rounds: u32,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::RoundStarted { conversation_id, .. }
            | Self::StepReceived { conversation_id, .. }
            | Self::ToolExecuted { conversation_id, .. }
            | Self::RequestCompleted { conversation_id, .. }
            | Self::RequestFailed { conversation_id, .. } => conversation_id,
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
