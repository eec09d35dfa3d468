//! Storage contract for the reference vocabularies.

use crate::board::domain::{ReferenceDraft, ReferenceEntry, ReferenceKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for reference store operations.
pub type ReferenceStoreResult<T> = Result<T, ReferenceStoreError>;

/// Reference vocabulary persistence contract.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Returns every entry of a vocabulary.
    async fn list_entries(&self, kind: ReferenceKind) -> ReferenceStoreResult<Vec<ReferenceEntry>>;

    /// Inserts the compiled-in defaults of a vocabulary, skipping codes that
    /// already exist. Returns the number of inserted rows.
    ///
    /// Concurrent callers race safely: the unique code constraint turns the
    /// losing inserts into no-ops.
    async fn seed_defaults(&self, kind: ReferenceKind) -> ReferenceStoreResult<usize>;

    /// Inserts or updates the entry with the draft's code.
    async fn save_entry(
        &self,
        kind: ReferenceKind,
        draft: &ReferenceDraft,
    ) -> ReferenceStoreResult<ReferenceEntry>;
}

/// Errors returned by reference store implementations.
#[derive(Debug, Clone, Error)]
pub enum ReferenceStoreError {
    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ReferenceStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
