//! The content repository collaborator.

use std::{
    collections::BTreeMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{ContentRecord, Dimensions, RecordKey, RepositoryError};

/// Supplies content records to the indexer and resolves search hits back to records.
pub trait ContentRepository: Send + Sync {
    /// Looks up one node variant.
    fn find(
        &self,
        identifier: &str,
        workspace: &str,
        dimensions: &Dimensions,
    ) -> Result<Option<ContentRecord>, RepositoryError>;

    /// Enumerates every record variant for (re)indexing.
    fn records(&self) -> Result<Vec<ContentRecord>, RepositoryError>;
}

/// An in-memory repository keyed by [`RecordKey`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    /// Stored variants.
    records: RwLock<BTreeMap<RecordKey, ContentRecord>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record variant. Returns the previous variant, if any.
    pub fn insert(&self, record: ContentRecord) -> Result<Option<ContentRecord>, RepositoryError> {
        Ok(self.write()?.insert(record.key(), record))
    }

    /// Removes a record variant.
    pub fn remove(&self, key: &RecordKey) -> Result<Option<ContentRecord>, RepositoryError> {
        Ok(self.write()?.remove(key))
    }

    /// Number of stored variants.
    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.read()?.len())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.read()?.is_empty())
    }

    /// Acquires the read lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<RecordKey, ContentRecord>>, RepositoryError> {
        self.records.read().map_err(|_| RepositoryError::Poisoned)
    }

    /// Acquires the write lock.
    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<RecordKey, ContentRecord>>, RepositoryError> {
        self.records.write().map_err(|_| RepositoryError::Poisoned)
    }
}

impl FromIterator<ContentRecord> for MemoryRepository {
    fn from_iter<I: IntoIterator<Item = ContentRecord>>(iter: I) -> Self {
        let records = iter.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

impl ContentRepository for MemoryRepository {
    fn find(
        &self,
        identifier: &str,
        workspace: &str,
        dimensions: &Dimensions,
    ) -> Result<Option<ContentRecord>, RepositoryError> {
        let key = RecordKey {
            identifier: identifier.to_string(),
            workspace: workspace.to_string(),
            dimensions: dimensions.clone(),
        };
        Ok(self.read()?.get(&key).cloned())
    }

    fn records(&self) -> Result<Vec<ContentRecord>, RepositoryError> {
        Ok(self.read()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodePath;

    fn record(id: &str, lang: &str) -> ContentRecord {
        ContentRecord::new(id, "Page", NodePath::parse(&format!("/site/{id}")).unwrap())
            .with_dimensions(Dimensions::language(lang))
    }

    #[test]
    fn test_find_by_variant() {
        let repo: MemoryRepository = [record("a", "en_US"), record("a", "de")].into_iter().collect();

        let found = repo.find("a", "live", &Dimensions::language("de")).unwrap();
        assert_eq!(found.unwrap().dimensions, Dimensions::language("de"));
        assert!(repo.find("a", "live", &Dimensions::language("fr")).unwrap().is_none());
        assert!(repo.find("a", "user-admin", &Dimensions::language("de")).unwrap().is_none());
        assert_eq!(repo.len().unwrap(), 2);
    }

    #[test]
    fn test_insert_replaces_variant() {
        let repo = MemoryRepository::new();
        assert!(repo.insert(record("a", "en_US")).unwrap().is_none());
        let previous = repo
            .insert(record("a", "en_US").with_property("title", "egg"))
            .unwrap();
        assert!(previous.is_some());
        assert_eq!(repo.records().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let repo = MemoryRepository::new();
        let rec = record("a", "en_US");
        let key = rec.key();
        repo.insert(rec).unwrap();
        assert!(repo.remove(&key).unwrap().is_some());
        assert!(repo.is_empty().unwrap());
    }
}
