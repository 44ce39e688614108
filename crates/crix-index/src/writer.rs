//! Index writer: document upserts and deletes, plus the physical index lifecycle.
//!
//! The writer always targets the physical index named by the alias. `rebuild` fills a fresh
//! physical index from the content repository and repoints the alias once it is committed;
//! `cleanup` removes physical indices the alias no longer points at.

use std::{fs, path::Path, slice};

use crix_config::Config;
use crix_content::{ContentRecord, ContentRepository, RecordKey};
use tantivy::{
    Index, IndexReader, IndexWriter as TantivyIndexWriter, ReloadPolicy, TantivyError, Term,
    directory::MmapDirectory, tokenizer::TextAnalyzer,
};
use tracing::{debug, info, warn};

use crate::{
    IndexError,
    analyzer::{CRIX_TOKENIZER, build_analyzer_from_name},
    document::{DocumentMapper, IndexDocument, record_key},
    fingerprint::compute_fingerprint,
    location::IndexLocation,
    schema::IndexSchema,
    status::{IndexStatus, status_for_fingerprint, write_fingerprint},
};

/// Outcome of indexing a batch of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Records written to the index.
    pub indexed: usize,
    /// Records skipped because a property could not be mapped.
    pub skipped: usize,
}

/// Opens or creates the Tantivy index in `dir` and registers the analyzer.
pub fn open_physical_index(
    dir: &Path,
    physical: &str,
    schema: &IndexSchema,
    analyzer: &TextAnalyzer,
) -> Result<Index, IndexError> {
    fs::create_dir_all(dir)?;

    let directory = MmapDirectory::open(dir).map_err(|e| {
        let err: TantivyError = e.into();
        IndexError::backend(physical, &err)
    })?;

    let index = Index::open_or_create(directory, schema.schema().clone())
        .map_err(|e| IndexError::backend(physical, &e))?;
    index
        .tokenizers()
        .register(CRIX_TOKENIZER, analyzer.clone());
    Ok(index)
}

/// The physical index currently written to.
struct ActiveIndex {
    /// Physical index name.
    physical: String,
    /// The Tantivy index.
    index: Index,
    /// The underlying Tantivy writer, holding the directory lock.
    writer: TantivyIndexWriter,
}

/// Writes records to the aliased physical index.
///
/// One writer serializes all writes and rebuilds for an index name. A second writer on the
/// same physical index fails to open with [`IndexError::BackendUnavailable`].
pub struct IndexWriter {
    /// Alias and physical index paths.
    location: IndexLocation,
    /// Schema with field handles.
    schema: IndexSchema,
    /// Record to document mapper.
    mapper: DocumentMapper,
    /// Analyzer registered with every opened index.
    analyzer: TextAnalyzer,
    /// Fingerprint of the running configuration.
    fingerprint: String,
    /// Memory budget of the Tantivy writer.
    heap_size: usize,
    /// Open index, or `None` when the aliased index has a stale mapping.
    active: Option<ActiveIndex>,
}

impl IndexWriter {
    /// Opens the writer for the index configured in `config`.
    ///
    /// If no alias exists yet, an empty physical index is created and the alias pointed at
    /// it. If the aliased index was built with a different mapping, the writer opens but
    /// refuses writes until [`rebuild`](Self::rebuild) runs.
    #[tracing::instrument(skip_all, fields(index = %config.index.name))]
    pub fn open(config: &Config) -> Result<Self, IndexError> {
        let location = IndexLocation::from_config(config)?;
        let mut writer = Self {
            schema: IndexSchema::new(&config.mapping),
            mapper: DocumentMapper::new(config.mapping.clone()),
            analyzer: build_analyzer_from_name(&config.search.stemmer)?,
            fingerprint: compute_fingerprint(config),
            heap_size: config.index.heap_size,
            active: None,
            location,
        };

        match writer.status()? {
            IndexStatus::Current => {
                if let Some(physical) = writer.location.read_alias()? {
                    debug!(physical = %physical, "Opening aliased index");
                    writer.active = Some(writer.open_active(physical)?);
                }
            }
            IndexStatus::MappingChanged => {
                warn!("Aliased index was built with a different mapping; rebuild required");
            }
            IndexStatus::Missing => {
                let active = writer.create_physical()?;
                writer.location.write_alias(&active.physical)?;
                info!(physical = %active.physical, "Created index");
                writer.active = Some(active);
            }
        }
        Ok(writer)
    }

    /// Writes documents, replacing any earlier document with the same key, and commits.
    pub fn upsert(&mut self, docs: &[IndexDocument]) -> Result<(), IndexError> {
        let active = require_active(&mut self.active, &self.location)?;
        write_documents(active, &self.schema, docs)
    }

    /// Maps and writes a single record.
    pub fn index_record(&mut self, record: &ContentRecord) -> Result<IndexStats, IndexError> {
        self.index_records(slice::from_ref(record))
    }

    /// Maps and writes records.
    ///
    /// Records with a property that cannot be represented in its field are logged and
    /// skipped; the rest of the batch is written.
    pub fn index_records(&mut self, records: &[ContentRecord]) -> Result<IndexStats, IndexError> {
        let (docs, skipped) = map_records(&self.mapper, records)?;
        self.upsert(&docs)?;
        Ok(IndexStats {
            indexed: docs.len(),
            skipped,
        })
    }

    /// Deletes every variant of the given records and commits.
    pub fn delete(&mut self, identifiers: &[&str]) -> Result<(), IndexError> {
        let active = require_active(&mut self.active, &self.location)?;
        for identifier in identifiers {
            active
                .writer
                .delete_term(Term::from_field_text(self.schema.identifier, identifier));
        }
        active.writer.commit().map_err(|e| IndexError::commit(&e))?;
        Ok(())
    }

    /// Deletes one record variant and commits.
    pub fn delete_variant(&mut self, key: &RecordKey) -> Result<(), IndexError> {
        let active = require_active(&mut self.active, &self.location)?;
        active
            .writer
            .delete_term(Term::from_field_text(self.schema.key, &record_key(key)));
        active.writer.commit().map_err(|e| IndexError::commit(&e))?;
        Ok(())
    }

    /// Rebuilds the index from every record of `repository`.
    ///
    /// A new physical index is filled and committed before the alias is repointed, so
    /// searches keep using the previous index until the switch. The previous physical index
    /// stays on disk until [`cleanup`](Self::cleanup).
    #[tracing::instrument(skip_all, fields(index = %self.location.name()))]
    pub fn rebuild(&mut self, repository: &dyn ContentRepository) -> Result<IndexStats, IndexError> {
        let records = repository.records()?;
        let (docs, skipped) = map_records(&self.mapper, &records)?;

        let mut fresh = self.create_physical()?;
        write_documents(&mut fresh, &self.schema, &docs)?;
        self.location.write_alias(&fresh.physical)?;
        info!(
            physical = %fresh.physical,
            indexed = docs.len(),
            skipped,
            "Rebuilt index"
        );

        // Dropping the previous writer releases its directory lock
        self.active = Some(fresh);
        Ok(IndexStats {
            indexed: docs.len(),
            skipped,
        })
    }

    /// Removes every physical index the alias does not point at.
    ///
    /// Returns the names of the removed indices.
    #[tracing::instrument(skip_all, fields(index = %self.location.name()))]
    pub fn cleanup(&mut self) -> Result<Vec<String>, IndexError> {
        let aliased = self.location.read_alias()?;
        let mut removed = Vec::new();
        for physical in self.location.physical_indices()? {
            if aliased.as_deref() == Some(physical.as_str()) {
                continue;
            }
            fs::remove_dir_all(self.location.physical_dir(&physical))?;
            debug!(physical = %physical, "Removed physical index");
            removed.push(physical);
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "Cleaned up physical indices");
        }
        Ok(removed)
    }

    /// Returns the number of documents in the active index.
    pub fn num_docs(&self) -> Result<u64, IndexError> {
        let active = self.active.as_ref().ok_or_else(|| mismatch(&self.location))?;
        let reader: IndexReader = active
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::backend(&active.physical, &e))?;
        Ok(reader.searcher().num_docs())
    }

    /// Returns the status of the aliased index against the writer's configuration.
    pub fn status(&self) -> Result<IndexStatus, IndexError> {
        status_for_fingerprint(&self.location, &self.fingerprint)
    }

    /// Name of the physical index being written, if any.
    pub fn physical_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.physical.as_str())
    }

    /// Where the index lives.
    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    /// Opens an existing physical index for writing.
    fn open_active(&self, physical: String) -> Result<ActiveIndex, IndexError> {
        let dir = self.location.physical_dir(&physical);
        let index = open_physical_index(&dir, &physical, &self.schema, &self.analyzer)?;
        // A single indexing thread keeps documents in write order
        let writer = index
            .writer_with_num_threads(1, self.heap_size)
            .map_err(|e| IndexError::backend(&physical, &e))?;
        Ok(ActiveIndex {
            physical,
            index,
            writer,
        })
    }

    /// Creates and opens a new, empty physical index carrying the current fingerprint.
    fn create_physical(&self) -> Result<ActiveIndex, IndexError> {
        let physical = self.location.new_physical_name();
        let active = self.open_active(physical)?;
        write_fingerprint(&self.location.physical_dir(&active.physical), &self.fingerprint)?;
        Ok(active)
    }
}

/// Returns the active index, or `MappingMismatch` when writes are refused.
fn require_active<'a>(
    active: &'a mut Option<ActiveIndex>,
    location: &IndexLocation,
) -> Result<&'a mut ActiveIndex, IndexError> {
    active.as_mut().ok_or_else(|| mismatch(location))
}

/// The error returned while the aliased index has a stale mapping.
fn mismatch(location: &IndexLocation) -> IndexError {
    IndexError::MappingMismatch {
        index: location.name().to_string(),
    }
}

/// Maps records, skipping the ones with unsupported properties.
fn map_records(
    mapper: &DocumentMapper,
    records: &[ContentRecord],
) -> Result<(Vec<IndexDocument>, usize), IndexError> {
    let mut docs = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match mapper.map(record) {
            Ok(doc) => docs.push(doc),
            Err(err @ IndexError::UnsupportedFieldType { .. }) => {
                warn!(identifier = %record.identifier, error = %err, "Skipping record");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok((docs, skipped))
}

/// Replaces documents by key and commits.
fn write_documents(
    active: &mut ActiveIndex,
    schema: &IndexSchema,
    docs: &[IndexDocument],
) -> Result<(), IndexError> {
    for doc in docs {
        active
            .writer
            .delete_term(Term::from_field_text(schema.key, &doc.key));
        active
            .writer
            .add_document(doc.to_tantivy(schema))
            .map_err(|e| IndexError::write(&e))?;
    }
    active.writer.commit().map_err(|e| IndexError::commit(&e))?;
    debug!(physical = %active.physical, count = docs.len(), "Committed documents");
    Ok(())
}

#[cfg(test)]
mod test {
    use crix_config::{FieldKind, Mapping};
    use crix_content::{Dimensions, MemoryRepository, NodePath, PropertyValue};
    use tempfile::TempDir;

    use super::*;

    fn config(root: &Path) -> Config {
        Config {
            mapping: Mapping::default().with("position", FieldKind::Integer),
            ..Config::with_index_root(root)
        }
    }

    fn page(identifier: &str, title: &str) -> ContentRecord {
        ContentRecord::new(
            identifier,
            "Page",
            NodePath::parse(&format!("/sites/site/{identifier}")).unwrap(),
        )
        .with_dimensions(Dimensions::language("en_US"))
        .with_property("title", title)
    }

    #[test]
    fn open_creates_aliased_index() {
        let temp = TempDir::new().unwrap();
        let writer = IndexWriter::open(&config(temp.path())).unwrap();

        let physical = writer.physical_name().unwrap().to_string();
        assert_eq!(
            writer.location().read_alias().unwrap().as_deref(),
            Some(physical.as_str())
        );
        assert!(temp.path().join(&physical).join("meta.json").exists());
        assert_eq!(writer.status().unwrap(), IndexStatus::Current);
        assert_eq!(writer.num_docs().unwrap(), 0);
    }

    #[test]
    fn reopen_uses_existing_index() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path());
        let first = {
            let mut writer = IndexWriter::open(&config).unwrap();
            writer.index_record(&page("egg", "egg")).unwrap();
            writer.physical_name().unwrap().to_string()
        };

        let writer = IndexWriter::open(&config).unwrap();
        assert_eq!(writer.physical_name(), Some(first.as_str()));
        assert_eq!(writer.num_docs().unwrap(), 1);
    }

    #[test]
    fn upsert_replaces_same_variant() {
        let temp = TempDir::new().unwrap();
        let mut writer = IndexWriter::open(&config(temp.path())).unwrap();

        writer.index_record(&page("egg", "egg")).unwrap();
        writer.index_record(&page("egg", "egg")).unwrap();
        assert_eq!(writer.num_docs().unwrap(), 1);

        let german = page("egg", "Ei").with_dimensions(Dimensions::language("de"));
        writer.index_record(&german).unwrap();
        assert_eq!(writer.num_docs().unwrap(), 2);
    }

    #[test]
    fn unsupported_records_are_skipped() {
        let temp = TempDir::new().unwrap();
        let mut writer = IndexWriter::open(&config(temp.path())).unwrap();

        let stats = writer
            .index_records(&[
                page("a", "fine"),
                page("b", "bad").with_property("position", "three"),
                page("c", "blob").with_property("title", PropertyValue::Binary(vec![1])),
            ])
            .unwrap();
        assert_eq!(
            stats,
            IndexStats {
                indexed: 1,
                skipped: 2
            }
        );
        assert_eq!(writer.num_docs().unwrap(), 1);
    }

    #[test]
    fn delete_removes_all_variants() {
        let temp = TempDir::new().unwrap();
        let mut writer = IndexWriter::open(&config(temp.path())).unwrap();
        let egg = page("egg", "egg");
        writer
            .index_records(&[
                egg.clone(),
                egg.variant(Dimensions::language("de")),
                page("chicken", "chicken"),
            ])
            .unwrap();

        writer.delete(&["egg"]).unwrap();
        assert_eq!(writer.num_docs().unwrap(), 1);
    }

    #[test]
    fn delete_variant_keeps_other_variants() {
        let temp = TempDir::new().unwrap();
        let mut writer = IndexWriter::open(&config(temp.path())).unwrap();
        let egg = page("egg", "egg");
        let german = egg.variant(Dimensions::language("de"));
        writer.index_records(&[egg, german.clone()]).unwrap();

        writer.delete_variant(&german.key()).unwrap();
        assert_eq!(writer.num_docs().unwrap(), 1);
    }

    #[test]
    fn rebuild_swaps_alias_and_cleanup_removes_old() {
        let temp = TempDir::new().unwrap();
        let mut writer = IndexWriter::open(&config(temp.path())).unwrap();
        let initial = writer.physical_name().unwrap().to_string();
        writer.index_record(&page("stale", "stale")).unwrap();

        let repository: MemoryRepository = [page("a", "chicken"), page("b", "egg")]
            .into_iter()
            .collect();
        let stats = writer.rebuild(&repository).unwrap();
        assert_eq!(stats.indexed, 2);

        let rebuilt = writer.physical_name().unwrap().to_string();
        assert_ne!(rebuilt, initial);
        assert_eq!(
            writer.location().read_alias().unwrap().as_deref(),
            Some(rebuilt.as_str())
        );
        assert_eq!(writer.num_docs().unwrap(), 2);

        assert_eq!(writer.cleanup().unwrap(), vec![initial.clone()]);
        assert!(!temp.path().join(&initial).exists());
        assert!(writer.cleanup().unwrap().is_empty());
    }

    #[test]
    fn stale_mapping_refuses_writes_until_rebuild() {
        let temp = TempDir::new().unwrap();
        {
            let mut writer = IndexWriter::open(&config(temp.path())).unwrap();
            writer.index_record(&page("egg", "egg")).unwrap();
        }

        let changed = Config {
            mapping: Mapping::default().with("position", FieldKind::Float),
            ..Config::with_index_root(temp.path())
        };
        let mut writer = IndexWriter::open(&changed).unwrap();
        assert_eq!(writer.status().unwrap(), IndexStatus::MappingChanged);
        assert!(writer.physical_name().is_none());
        assert!(matches!(
            writer.index_record(&page("egg", "egg")),
            Err(IndexError::MappingMismatch { .. })
        ));

        let repository: MemoryRepository = [page("egg", "egg")].into_iter().collect();
        writer.rebuild(&repository).unwrap();
        assert_eq!(writer.status().unwrap(), IndexStatus::Current);
        writer.index_record(&page("chicken", "chicken")).unwrap();
        assert_eq!(writer.num_docs().unwrap(), 2);
    }

    #[test]
    fn invalid_stemmer_fails_open() {
        let temp = TempDir::new().unwrap();
        let mut config = config(temp.path());
        config.search.stemmer = "klingon".into();
        assert!(matches!(
            IndexWriter::open(&config),
            Err(IndexError::InvalidLanguage(_))
        ));
    }
}
