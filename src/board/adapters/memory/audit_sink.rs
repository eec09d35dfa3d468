//! In-memory audit sink.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::board::{
    domain::{AuditEntry, StatusChange, StatusHistoryRecord, TaskId},
    ports::{AuditSink, AuditSinkError},
};

/// Thread-safe audit sink that keeps entries in arrival order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every recorded entry.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Returns the status changes recorded for one task, oldest first.
    #[must_use]
    pub fn status_history(&self, task_id: TaskId) -> Vec<StatusChange> {
        self.entries()
            .iter()
            .filter_map(AuditEntry::status_change)
            .filter(|change| change.task_id == task_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditSinkError> {
        let mut entries = self.entries.write().map_err(|err| {
            AuditSinkError::persistence(std::io::Error::other(err.to_string()))
        })?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn history(&self, task_id: TaskId) -> Result<Vec<StatusHistoryRecord>, AuditSinkError> {
        let entries = self.entries.read().map_err(|err| {
            AuditSinkError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let mut records: Vec<StatusHistoryRecord> = entries
            .iter()
            .rev()
            .filter_map(AuditEntry::history_record)
            .filter(|record| record.change.task_id == task_id)
            .collect();
        records.sort_by(|left, right| right.changed_at.cmp(&left.changed_at));
        Ok(records)
    }
}
