//! Event broadcaster trait and in-memory implementation.
//!
//! Broadcasts happen only after commit and are best-effort: a failing
//! broadcaster never fails the committed operation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::ServiceError;

/// Trait for publishing domain events to external consumers.
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// Publishes one named event with a JSON payload.
    async fn publish(&self, event: &str, payload: serde_json::Value) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct BroadcasterState {
    events: Vec<(String, serde_json::Value)>,
    fail_on_publish: bool,
}

/// In-memory broadcaster that records published events for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroadcaster {
    state: Arc<RwLock<BroadcasterState>>,
}

impl InMemoryBroadcaster {
    /// Creates a new in-memory broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the broadcaster to fail on publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns all published events in order.
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.state.read().unwrap().events.clone()
    }

    /// Returns the names of published events in order.
    pub fn event_names(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .events
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl EventBroadcaster for InMemoryBroadcaster {
    async fn publish(&self, event: &str, payload: serde_json::Value) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(ServiceError::new("broadcast channel closed"));
        }
        state.events.push((event.to_string(), payload));
        Ok(())
    }
}
