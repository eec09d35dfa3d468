//! Audit log sink contract.

use crate::board::domain::{AuditEntry, StatusHistoryRecord, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one entry.
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditSinkError>;

    /// Returns the status changes recorded for a task, newest first.
    async fn history(&self, task_id: TaskId) -> Result<Vec<StatusHistoryRecord>, AuditSinkError>;
}

/// Errors returned by audit sinks.
#[derive(Debug, Clone, Error)]
pub enum AuditSinkError {
    /// The event payload could not be encoded.
    #[error("audit payload could not be encoded: {0}")]
    Encoding(String),

    /// A stored record no longer maps onto the domain model.
    #[error("stored history record {id} is invalid: {reason}")]
    InvalidRecord {
        /// Record identifier.
        id: uuid::Uuid,
        /// What failed to convert.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AuditSinkError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
