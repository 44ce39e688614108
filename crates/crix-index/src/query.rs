//! Fluent queries bound to a [`Searcher`].

use crix_content::PropertyValue;
use crix_query::QuerySpec;

use crate::{IndexError, result::ResultSet, search::Searcher};

/// A [`QuerySpec`] bound to the searcher that will run it.
///
/// Builder methods consume the query and return the refined one. Cloning a query and
/// refining the clone leaves the original untouched:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use crix_config::Config;
/// # use crix_content::{ContentRecord, MemoryRepository, NodePath};
/// # use crix_index::Searcher;
/// # let config = Config::with_index_root("./index");
/// # let searcher = Searcher::open(&config, Arc::new(MemoryRepository::new())).unwrap();
/// # let site = ContentRecord::new("site", "Site", NodePath::parse("/sites/demo").unwrap());
/// let pages = searcher.query(&site).node_type("Page");
/// let total = pages.clone().count().unwrap();
/// let first = pages.sort_asc("title").limit(1).execute().unwrap();
/// assert!(first.accessible_count() <= 1);
/// assert_eq!(first.total(), total);
/// ```
#[derive(Clone)]
pub struct NodeQuery<'a> {
    /// Runs the query.
    searcher: &'a Searcher,
    /// Accumulated clauses.
    spec: QuerySpec,
}

impl<'a> NodeQuery<'a> {
    /// Binds `spec` to `searcher`.
    pub fn new(searcher: &'a Searcher, spec: QuerySpec) -> Self {
        Self { searcher, spec }
    }

    /// Restricts to an exact node type.
    pub fn node_type(self, node_type: impl Into<String>) -> Self {
        self.refine(|spec| spec.node_type(node_type))
    }

    /// Excludes a node type.
    pub fn exclude_node_type(self, node_type: impl Into<String>) -> Self {
        self.refine(|spec| spec.exclude_node_type(node_type))
    }

    /// Restricts to records whose property equals `value` without analysis.
    pub fn exact_match(self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.refine(|spec| spec.exact_match(field, value))
    }

    /// Restricts to records whose text fields contain every analyzed token of `text`.
    pub fn full_text(self, text: impl Into<String>) -> Self {
        self.refine(|spec| spec.full_text(text))
    }

    /// `field > value`
    pub fn greater_than(self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.refine(|spec| spec.greater_than(field, value))
    }

    /// `field >= value`
    pub fn greater_than_or_equal(
        self,
        field: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.refine(|spec| spec.greater_than_or_equal(field, value))
    }

    /// `field < value`
    pub fn less_than(self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.refine(|spec| spec.less_than(field, value))
    }

    /// `field <= value`
    pub fn less_than_or_equal(
        self,
        field: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.refine(|spec| spec.less_than_or_equal(field, value))
    }

    /// Caps the number of returned items. [`count`](Self::count) is unaffected.
    pub fn limit(self, limit: usize) -> Self {
        self.refine(|spec| spec.limit(limit))
    }

    /// Skips the first `offset` items. [`count`](Self::count) is unaffected.
    pub fn from(self, offset: usize) -> Self {
        self.refine(|spec| spec.from(offset))
    }

    /// Appends an ascending sort key.
    pub fn sort_asc(self, field: impl Into<String>) -> Self {
        self.refine(|spec| spec.sort_asc(field))
    }

    /// Appends a descending sort key.
    pub fn sort_desc(self, field: impl Into<String>) -> Self {
        self.refine(|spec| spec.sort_desc(field))
    }

    /// Requests a terms aggregation exposed under `name`.
    pub fn field_based_aggregation(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.refine(|spec| spec.field_based_aggregation(name, field))
    }

    /// Requests a terms aggregation with an explicit bucket count.
    pub fn field_based_aggregation_with_size(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        size: u32,
    ) -> Self {
        self.refine(|spec| spec.field_based_aggregation_with_size(name, field, size))
    }

    /// Requests suggestions for `term`, returned under `"suggestions"`.
    pub fn term_suggestions(self, term: impl Into<String>, field: impl Into<String>) -> Self {
        self.refine(|spec| spec.term_suggestions(term, field))
    }

    /// Requests suggestions for `term` under a chosen name.
    pub fn term_suggestions_named(
        self,
        name: impl Into<String>,
        term: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.refine(|spec| spec.term_suggestions_named(name, term, field))
    }

    /// Logs the compiled query and its timing when it runs.
    pub fn log(self) -> Self {
        self.refine(QuerySpec::log)
    }

    /// The accumulated specification.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Unbinds the specification from the searcher.
    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    /// Counts matching records, ignoring `from` and `limit`.
    pub fn count(&self) -> Result<u64, IndexError> {
        self.searcher.count(&self.spec)
    }

    /// Runs the query.
    pub fn execute(&self) -> Result<ResultSet, IndexError> {
        self.searcher.execute(&self.spec)
    }

    /// Applies one builder step to the accumulated clauses.
    fn refine(self, step: impl FnOnce(QuerySpec) -> QuerySpec) -> Self {
        Self {
            searcher: self.searcher,
            spec: step(self.spec),
        }
    }
}
