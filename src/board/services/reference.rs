//! Cached access to the reference vocabularies with self-healing defaults.

use crate::board::{
    domain::{
        PriorityId, ReferenceCatalog, ReferenceDraft, ReferenceEntry, ReferenceKind, StatusId,
        TypeId,
    },
    ports::{ReferenceStore, ReferenceStoreError},
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while resolving reference data.
#[derive(Debug, Clone, Error)]
pub enum ReferenceError {
    /// No entry carries the code.
    #[error("unknown {kind} code '{code}'")]
    UnknownCode {
        /// Vocabulary searched.
        kind: ReferenceKind,
        /// Code that did not match.
        code: String,
    },

    /// The vocabulary is still empty after seeding its defaults.
    #[error("{0} vocabulary is empty after seeding defaults")]
    Uninitialized(ReferenceKind),

    /// A stored identifier is not a valid reference identifier.
    #[error("{kind} row has invalid identifier {id}")]
    InvalidId {
        /// Vocabulary read.
        kind: ReferenceKind,
        /// Offending identifier.
        id: i32,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] ReferenceStoreError),
}

/// Reference data lookups backed by an in-process catalog per vocabulary.
///
/// Catalogs load lazily and stay cached until [`Self::invalidate`] is
/// called or an entry is saved through [`Self::save_entry`]. Empty
/// vocabularies are never cached.
pub struct ReferenceDataResolver<S>
where
    S: ReferenceStore,
{
    store: Arc<S>,
    cache: RwLock<CatalogCache>,
}

type CatalogCache = HashMap<ReferenceKind, Arc<ReferenceCatalog>>;

impl<S> ReferenceDataResolver<S>
where
    S: ReferenceStore,
{
    /// Creates a resolver with an empty cache.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the catalog of a vocabulary, loading it when not cached.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Store`] when loading fails.
    pub async fn catalog(&self, kind: ReferenceKind) -> Result<Arc<ReferenceCatalog>, ReferenceError> {
        if let Some(catalog) = self.cached(kind) {
            return Ok(catalog);
        }
        let entries = self.store.list_entries(kind).await?;
        let catalog = Arc::new(ReferenceCatalog::new(entries));
        if !catalog.is_empty() {
            self.write_cache().insert(kind, Arc::clone(&catalog));
            debug!(%kind, entries = catalog.entries().len(), "loaded reference catalog");
        }
        Ok(catalog)
    }

    /// Drops the cached catalog of a vocabulary.
    pub fn invalidate(&self, kind: ReferenceKind) {
        self.write_cache().remove(&kind);
    }

    /// Returns the default type: `feature` when present, otherwise the first
    /// type by display order. Seeds the defaults once when the vocabulary is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] when seeding fails or leaves the vocabulary
    /// empty.
    pub async fn default_type(&self) -> Result<TypeId, ReferenceError> {
        let entry = self.default_entry(ReferenceKind::Type).await?;
        TypeId::new(entry.id).map_err(|_| ReferenceError::InvalidId {
            kind: ReferenceKind::Type,
            id: entry.id,
        })
    }

    /// Returns the default priority, `medium` when present.
    ///
    /// # Errors
    ///
    /// See [`Self::default_type`].
    pub async fn default_priority(&self) -> Result<PriorityId, ReferenceError> {
        let entry = self.default_entry(ReferenceKind::Priority).await?;
        PriorityId::new(entry.id).map_err(|_| ReferenceError::InvalidId {
            kind: ReferenceKind::Priority,
            id: entry.id,
        })
    }

    /// Returns the first status by display order.
    ///
    /// # Errors
    ///
    /// See [`Self::default_type`].
    pub async fn default_status(&self) -> Result<StatusId, ReferenceError> {
        let entry = self.default_entry(ReferenceKind::Status).await?;
        StatusId::new(entry.id).map_err(|_| ReferenceError::InvalidId {
            kind: ReferenceKind::Status,
            id: entry.id,
        })
    }

    /// Resolves an optional type code; blank or absent codes resolve to the
    /// default type.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::UnknownCode`] for codes that match nothing.
    pub async fn resolve_type(&self, code: Option<&str>) -> Result<TypeId, ReferenceError> {
        match code.map(str::trim).filter(|value| !value.is_empty()) {
            None => self.default_type().await,
            Some(value) => {
                let entry = self.require_code(ReferenceKind::Type, value).await?;
                TypeId::new(entry.id).map_err(|_| ReferenceError::InvalidId {
                    kind: ReferenceKind::Type,
                    id: entry.id,
                })
            }
        }
    }

    /// Resolves an optional priority code; blank or absent codes resolve to
    /// the default priority.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::UnknownCode`] for codes that match nothing.
    pub async fn resolve_priority(&self, code: Option<&str>) -> Result<PriorityId, ReferenceError> {
        match code.map(str::trim).filter(|value| !value.is_empty()) {
            None => self.default_priority().await,
            Some(value) => {
                let entry = self.require_code(ReferenceKind::Priority, value).await?;
                PriorityId::new(entry.id).map_err(|_| ReferenceError::InvalidId {
                    kind: ReferenceKind::Priority,
                    id: entry.id,
                })
            }
        }
    }

    /// Looks an entry up by id, reloading the catalog once on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Store`] when loading fails.
    pub async fn find_by_id(
        &self,
        kind: ReferenceKind,
        id: i32,
    ) -> Result<Option<ReferenceEntry>, ReferenceError> {
        if let Some(entry) = self.catalog(kind).await?.by_id(id) {
            return Ok(Some(entry.clone()));
        }
        self.invalidate(kind);
        Ok(self.catalog(kind).await?.by_id(id).cloned())
    }

    /// Looks an entry up by code.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Store`] when loading fails.
    pub async fn find_by_code(
        &self,
        kind: ReferenceKind,
        code: &str,
    ) -> Result<Option<ReferenceEntry>, ReferenceError> {
        Ok(self.catalog(kind).await?.by_code(code).cloned())
    }

    /// Returns every entry of a vocabulary in display order.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Store`] when loading fails.
    pub async fn entries(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, ReferenceError> {
        Ok(self.catalog(kind).await?.entries().to_vec())
    }

    /// Seeds every empty vocabulary. Returns the number of inserted rows.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Store`] when loading or seeding fails.
    pub async fn ensure_defaults(&self) -> Result<usize, ReferenceError> {
        let mut inserted = 0;
        for kind in ReferenceKind::ALL {
            if self.catalog(kind).await?.is_empty() {
                inserted += self.seed(kind).await?;
            }
        }
        Ok(inserted)
    }

    /// Inserts or updates an entry and drops the cached catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Store`] when the store rejects the entry.
    pub async fn save_entry(
        &self,
        kind: ReferenceKind,
        draft: &ReferenceDraft,
    ) -> Result<ReferenceEntry, ReferenceError> {
        let entry = self.store.save_entry(kind, draft).await?;
        self.invalidate(kind);
        info!(%kind, code = %entry.code, id = entry.id, "saved reference entry");
        Ok(entry)
    }

    fn cached(&self, kind: ReferenceKind) -> Option<Arc<ReferenceCatalog>> {
        self.read_cache().get(&kind).cloned()
    }

    // Cached catalogs are immutable, so a poisoned map is still consistent.
    fn read_cache(&self) -> RwLockReadGuard<'_, CatalogCache> {
        self.cache.read().unwrap_or_else(|poisoned| {
            warn!("reference cache lock was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, CatalogCache> {
        self.cache.write().unwrap_or_else(|poisoned| {
            warn!("reference cache lock was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    async fn seed(&self, kind: ReferenceKind) -> Result<usize, ReferenceError> {
        let inserted = self.store.seed_defaults(kind).await?;
        self.invalidate(kind);
        info!(%kind, inserted, "seeded empty reference vocabulary");
        Ok(inserted)
    }

    async fn default_entry(&self, kind: ReferenceKind) -> Result<ReferenceEntry, ReferenceError> {
        let catalog = self.catalog(kind).await?;
        if let Some(entry) = pick_default(&catalog, kind) {
            return Ok(entry);
        }
        self.seed(kind).await?;
        let seeded = self.catalog(kind).await?;
        pick_default(&seeded, kind).ok_or(ReferenceError::Uninitialized(kind))
    }

    async fn require_code(
        &self,
        kind: ReferenceKind,
        code: &str,
    ) -> Result<ReferenceEntry, ReferenceError> {
        let mut catalog = self.catalog(kind).await?;
        if catalog.is_empty() {
            self.seed(kind).await?;
            catalog = self.catalog(kind).await?;
        }
        catalog
            .by_code(code)
            .cloned()
            .ok_or_else(|| ReferenceError::UnknownCode {
                kind,
                code: code.to_owned(),
            })
    }
}

fn pick_default(catalog: &ReferenceCatalog, kind: ReferenceKind) -> Option<ReferenceEntry> {
    kind.default_code()
        .and_then(|code| catalog.by_code(code))
        .or_else(|| catalog.first())
        .cloned()
}
