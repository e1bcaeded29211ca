//! Audit sink trait and in-memory implementation.
//!
//! Every mutating engine operation records exactly one audit entry after
//! commit. Like broadcasts, audit failures are logged and swallowed.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::ServiceError;

/// One recorded audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: Option<String>,
    pub metadata: serde_json::Value,
}

/// Trait for the audit log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one audit entry.
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError>;
}

/// In-memory audit log for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    /// Creates a new empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded entries in order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().unwrap().clone()
    }

    /// Returns the number of recorded entries.
    pub fn entry_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<(), ServiceError> {
        self.entries.write().unwrap().push(entry);
        Ok(())
    }
}
