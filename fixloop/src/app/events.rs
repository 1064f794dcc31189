//! Loop lifecycle events

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, Level};

use crate::app::fsm::LoopState;
use crate::models::iteration::Iteration;
use crate::models::result::LoopResult;

/// Event published by the orchestrator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    StateChanged {
        from: LoopState,
        to: LoopState,
    },
    Log {
        level: String,
        message: String,
    },
    IterationStarted {
        number: u32,
    },
    IterationUpdated {
        iteration: Box<Iteration>,
    },
    Finished {
        result: LoopResult,
    },
}

/// Fan-out of loop events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LoopEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Events without subscribers are dropped.
    pub fn publish(&self, event: LoopEvent) {
        if self.sender.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.publish(LoopEvent::Log {
            level: level.as_str().to_lowercase(),
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
