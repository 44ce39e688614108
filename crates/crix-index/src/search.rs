//! Query execution against the aliased index.
//!
//! A [`Searcher`] resolves the alias on every query, so it picks up rebuilds without being
//! reopened. Hits are resolved back into records through the content repository and passed
//! through the access filter before they reach the caller.

use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use crix_config::{Config, SuggestSettings};
use crix_content::{ContentRecord, ContentRepository};
use crix_query::{QuerySpec, RootContext};
use tantivy::{IndexReader, ReloadPolicy, tokenizer::TextAnalyzer};
use tracing::{debug, info};

use crate::{
    IndexError,
    analyzer::build_analyzer_from_name,
    backend::{self, run_with_timeout},
    fingerprint::compute_fingerprint,
    location::IndexLocation,
    query::NodeQuery,
    result::{AccessFilter, AllowAll, ResultMapper, ResultSet},
    schema::IndexSchema,
    status::{IndexStatus, read_stored_fingerprint, status_for_fingerprint},
    translate::QueryTranslator,
    writer::open_physical_index,
};

/// Reader for the physical index the alias pointed at when it was opened.
#[derive(Clone)]
struct OpenIndex {
    /// Physical index name.
    physical: String,
    /// Reader with a manual reload policy.
    reader: IndexReader,
}

/// Runs queries against the index configured for one alias name.
///
/// `Searcher` is `Send + Sync`; concurrent queries share one instance by reference.
pub struct Searcher {
    /// Alias and physical index paths.
    location: IndexLocation,
    /// Schema with field handles.
    schema: IndexSchema,
    /// Analyzer registered with opened indices.
    analyzer: TextAnalyzer,
    /// Compiles query specifications.
    translator: QueryTranslator,
    /// Fingerprint the opened index must carry.
    fingerprint: String,
    /// Term suggester tuning.
    suggest: SuggestSettings,
    /// Longest wait for a backend call.
    timeout: Duration,
    /// Resolves hit identifiers into records.
    repository: Arc<dyn ContentRepository>,
    /// Visibility check applied to resolved records.
    access: Arc<dyn AccessFilter>,
    /// Most recently opened physical index.
    current: RwLock<Option<OpenIndex>>,
}

impl Searcher {
    /// Creates a searcher for the index configured in `config`.
    ///
    /// The index itself is opened lazily by the first query, so a searcher can be created
    /// before the first rebuild.
    pub fn open(
        config: &Config,
        repository: Arc<dyn ContentRepository>,
    ) -> Result<Self, IndexError> {
        let location = IndexLocation::from_config(config)?;
        let schema = IndexSchema::new(&config.mapping);
        let analyzer = build_analyzer_from_name(&config.search.stemmer)?;
        let translator = QueryTranslator::new(
            schema.clone(),
            config.mapping.clone(),
            analyzer.clone(),
            config.search.clone(),
        );

        Ok(Self {
            location,
            schema,
            analyzer,
            translator,
            fingerprint: compute_fingerprint(config),
            suggest: config.suggest.clone(),
            timeout: Duration::from_millis(config.search.timeout_ms),
            repository,
            access: Arc::new(AllowAll),
            current: RwLock::new(None),
        })
    }

    /// Replaces the access filter applied to resolved hits.
    pub fn with_access_filter(mut self, access: impl AccessFilter + 'static) -> Self {
        self.access = Arc::new(access);
        self
    }

    /// Starts a query over the descendants of `root`, in its workspace and dimensions.
    pub fn query(&self, root: &ContentRecord) -> NodeQuery<'_> {
        NodeQuery::new(self, QuerySpec::new(RootContext::of(root)))
    }

    /// Counts the records matching `spec`, ignoring its offset and limit.
    pub fn count(&self, spec: &QuerySpec) -> Result<u64, IndexError> {
        let compiled = self.translator.translate(spec)?;
        let description = compiled.description.clone();
        let (physical, searcher) = self.tantivy_searcher()?;

        let started = Instant::now();
        let index = physical.clone();
        let total = run_with_timeout(&physical, self.timeout, move || {
            backend::count(&searcher, &compiled, &index)
        })?;

        if let Some(query) = description {
            info!(
                physical = %physical,
                query = %query,
                took_ms = started.elapsed().as_millis() as u64,
                total,
                "Counted query"
            );
        }
        Ok(total)
    }

    /// Runs `spec` and maps the response into a result set.
    pub fn execute(&self, spec: &QuerySpec) -> Result<ResultSet, IndexError> {
        let compiled = self.translator.translate(spec)?;
        self.translator.check_window(&compiled)?;
        let limit = compiled.limit;
        let description = compiled.description.clone();
        let (physical, searcher) = self.tantivy_searcher()?;

        let started = Instant::now();
        let schema = self.schema.clone();
        let suggest = self.suggest.clone();
        let index = physical.clone();
        let response = run_with_timeout(&physical, self.timeout, move || {
            backend::execute(&searcher, &schema, &compiled, &suggest, &index)
        })?;
        let total = response.total;
        let hits = response.hits.len();

        let mapper = ResultMapper::new(self.repository.as_ref(), self.access.as_ref());
        let results = mapper.map(spec.root(), limit, response)?;

        if let Some(query) = description {
            info!(
                physical = %physical,
                query = %query,
                took_ms = started.elapsed().as_millis() as u64,
                total,
                hits,
                accessible = results.accessible_count(),
                "Executed query"
            );
        }
        Ok(results)
    }

    /// Reports whether the aliased index matches the running configuration.
    pub fn status(&self) -> Result<IndexStatus, IndexError> {
        status_for_fingerprint(&self.location, &self.fingerprint)
    }

    /// Resolves the alias and returns a freshly reloaded searcher over its target.
    fn tantivy_searcher(&self) -> Result<(String, tantivy::Searcher), IndexError> {
        let physical =
            self.location
                .read_alias()?
                .ok_or_else(|| IndexError::BackendUnavailable {
                    index: self.location.name().to_string(),
                    message: "no index has been built".to_string(),
                })?;

        let reader = self.reader_for(&physical)?;
        reader
            .reload()
            .map_err(|e| IndexError::backend(&physical, &e))?;
        let searcher = reader.searcher();
        Ok((physical, searcher))
    }

    /// Returns the cached reader for `physical`, opening it if the alias moved.
    fn reader_for(&self, physical: &str) -> Result<IndexReader, IndexError> {
        {
            let current = self.current.read().map_err(|_| poisoned(physical))?;
            if let Some(open) = current.as_ref()
                && open.physical == physical
            {
                return Ok(open.reader.clone());
            }
        }

        let reader = self.open_reader(physical)?;
        let mut current = self.current.write().map_err(|_| poisoned(physical))?;
        *current = Some(OpenIndex {
            physical: physical.to_string(),
            reader: reader.clone(),
        });
        Ok(reader)
    }

    /// Opens a reader after checking the index exists and carries the expected fingerprint.
    fn open_reader(&self, physical: &str) -> Result<IndexReader, IndexError> {
        let dir = self.location.physical_dir(physical);
        if !dir.join("meta.json").exists() {
            return Err(IndexError::BackendUnavailable {
                index: physical.to_string(),
                message: format!("no index found at {}", dir.display()),
            });
        }
        if read_stored_fingerprint(&dir).as_deref() != Some(self.fingerprint.as_str()) {
            return Err(IndexError::MappingMismatch {
                index: physical.to_string(),
            });
        }

        let index = open_physical_index(&dir, physical, &self.schema, &self.analyzer)?;
        debug!(physical = %physical, "Opened index for search");
        index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| IndexError::backend(physical, &e))
    }
}

/// Error for a reader cache whose lock was poisoned by a panicking query.
fn poisoned(physical: &str) -> IndexError {
    IndexError::BackendUnavailable {
        index: physical.to_string(),
        message: "reader cache lock poisoned".to_string(),
    }
}
