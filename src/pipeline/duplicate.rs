//! Duplicate detection against the store and the local download cache.
//!
//! The guard is deliberately fail-open: a store error is logged and the
//! candidate proceeds, because a duplicate save is recoverable while a
//! silently skipped document is not.

use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use super::identifier;
use super::types::{DocumentRecord, DocumentReference};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store write failed: {0}")]
    WriteFailed(String),
}

/// Persistence seam for acquired documents. The pipeline only needs
/// containment checks, appends, and a size estimate.
pub trait DocumentStore: Send + Sync {
    /// True if any of the given search terms matches an existing record.
    fn find_existing(&self, terms: &[String]) -> Result<bool, StoreError>;

    fn save(&self, record: DocumentRecord) -> Result<(), StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

/// In-memory store, for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<DocumentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DocumentRecord> {
        self.records.lock().expect("store lock").clone()
    }
}

impl DocumentStore for InMemoryStore {
    fn find_existing(&self, terms: &[String]) -> Result<bool, StoreError> {
        let records = self.records.lock().expect("store lock");
        let found = records.iter().any(|r| {
            let haystacks = [
                r.document_id.to_lowercase(),
                r.url.to_lowercase(),
                r.title.to_lowercase(),
            ];
            terms.iter().any(|term| {
                let needle = term.to_lowercase();
                haystacks.iter().any(|h| h.contains(&needle))
            })
        });
        Ok(found)
    }

    fn save(&self, record: DocumentRecord) -> Result<(), StoreError> {
        self.records.lock().expect("store lock").push(record);
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().expect("store lock").len())
    }
}

/// Checks a candidate against the store and the download cache before any
/// network work is spent on it.
pub struct DuplicateGuard<'a> {
    store: &'a dyn DocumentStore,
    cache_dir: PathBuf,
}

impl<'a> DuplicateGuard<'a> {
    pub fn new(store: &'a dyn DocumentStore, cache_dir: PathBuf) -> Self {
        Self { store, cache_dir }
    }

    /// True if the candidate is already held. Store errors log a warning
    /// and report "not a duplicate".
    pub fn is_duplicate(&self, reference: &DocumentReference) -> bool {
        let mut terms = identifier::variants(&reference.identifier);
        terms.push(reference.canonical_url.clone());

        match self.store.find_existing(&terms) {
            Ok(true) => {
                tracing::info!(id = %reference.identifier, "Skipping duplicate (store match)");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(id = %reference.identifier, error = %e, "Duplicate check failed, proceeding");
            }
        }

        if let Some(path) = self.cached_file(&reference.identifier) {
            tracing::info!(id = %reference.identifier, path = %path.display(), "Skipping duplicate (cached file)");
            return true;
        }

        false
    }

    /// Existing cached download for the identifier, if any.
    pub fn cached_file(&self, canonical_id: &str) -> Option<PathBuf> {
        let slug = identifier::url_slug(canonical_id);
        for ext in ["rtf", "docx"] {
            let path = self.cache_dir.join(format!("{slug}.{ext}"));
            if path.is_file() {
                return Some(path);
            }
        }
        None
    }
}
