//! The query specification value and its fluent builder.

use crix_config::Mapping;
use crix_content::{ContentRecord, Dimensions, NodePath, PropertyValue};

use crate::{
    SpecError,
    clause::{AggregationRequest, Filter, RangeOp, SortClause, SortDirection, SuggestionRequest},
    validate::validate_spec,
};

/// Name used by [`QuerySpec::term_suggestions`].
pub const DEFAULT_SUGGESTION_NAME: &str = "suggestions";

/// The scope every query is confined to: descendants of a node, within one workspace and one
/// dimension vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootContext {
    /// Only strict descendants of this path match.
    pub path: NodePath,
    /// Workspace to search.
    pub workspace: String,
    /// Dimension vector to search.
    pub dimensions: Dimensions,
}

impl RootContext {
    /// Scopes to the subtree below a record, in the record's workspace and dimensions.
    pub fn of(record: &ContentRecord) -> Self {
        Self {
            path: record.path.clone(),
            workspace: record.workspace.clone(),
            dimensions: record.dimensions.clone(),
        }
    }
}

/// An immutable query specification.
///
/// Every builder method consumes the value and returns the extended one, so a spec can be
/// cloned and refined without affecting the original:
///
/// ```
/// use crix_content::{ContentRecord, NodePath};
/// use crix_query::{QuerySpec, RootContext};
///
/// let site = ContentRecord::new("site", "Site", NodePath::parse("/sites/demo").unwrap());
/// let pages = QuerySpec::new(RootContext::of(&site)).node_type("Page");
/// let first = pages.clone().sort_asc("title").limit(1);
///
/// assert_eq!(pages.limit_value(), None);
/// assert_eq!(first.limit_value(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Scope.
    root: RootContext,
    /// Filters in call order.
    filters: Vec<Filter>,
    /// Sort keys in precedence order.
    sorts: Vec<SortClause>,
    /// Items to skip.
    offset: usize,
    /// Items to return, if capped.
    limit: Option<usize>,
    /// Aggregations in call order.
    aggregations: Vec<AggregationRequest>,
    /// Suggestions in call order.
    suggestions: Vec<SuggestionRequest>,
    /// Whether to log the compiled query.
    log: bool,
}

impl QuerySpec {
    /// Creates an unfiltered specification over a scope.
    pub fn new(root: RootContext) -> Self {
        Self {
            root,
            filters: Vec::new(),
            sorts: Vec::new(),
            offset: 0,
            limit: None,
            aggregations: Vec::new(),
            suggestions: Vec::new(),
            log: false,
        }
    }

    /// Restricts to an exact node type.
    pub fn node_type(self, node_type: impl Into<String>) -> Self {
        self.filter(Filter::NodeType(node_type.into()))
    }

    /// Excludes a node type.
    pub fn exclude_node_type(self, node_type: impl Into<String>) -> Self {
        self.filter(Filter::ExcludeNodeType(node_type.into()))
    }

    /// Restricts to records whose property equals `value` without analysis.
    pub fn exact_match(self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.filter(Filter::ExactMatch {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Restricts to records whose text fields contain every analyzed token of `text`.
    pub fn full_text(self, text: impl Into<String>) -> Self {
        self.filter(Filter::FullText(text.into()))
    }

    /// `field > value`
    pub fn greater_than(self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.range(field, RangeOp::GreaterThan, value)
    }

    /// `field >= value`
    pub fn greater_than_or_equal(
        self,
        field: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.range(field, RangeOp::GreaterThanOrEqual, value)
    }

    /// `field < value`
    pub fn less_than(self, field: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.range(field, RangeOp::LessThan, value)
    }

    /// `field <= value`
    pub fn less_than_or_equal(
        self,
        field: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.range(field, RangeOp::LessThanOrEqual, value)
    }

    /// Caps the number of returned items. The total count is unaffected.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` items. The total count is unaffected.
    pub fn from(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Appends an ascending sort key.
    pub fn sort_asc(self, field: impl Into<String>) -> Self {
        self.sort(field, SortDirection::Asc)
    }

    /// Appends a descending sort key.
    pub fn sort_desc(self, field: impl Into<String>) -> Self {
        self.sort(field, SortDirection::Desc)
    }

    /// Requests a terms aggregation with the default bucket count.
    pub fn field_based_aggregation(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.aggregation(name.into(), field.into(), None)
    }

    /// Requests a terms aggregation with an explicit bucket count.
    pub fn field_based_aggregation_with_size(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        size: u32,
    ) -> Self {
        self.aggregation(name.into(), field.into(), Some(size))
    }

    /// Requests suggestions for `term` against `field`, returned under `"suggestions"`.
    pub fn term_suggestions(self, term: impl Into<String>, field: impl Into<String>) -> Self {
        self.term_suggestions_named(DEFAULT_SUGGESTION_NAME, term, field)
    }

    /// Requests suggestions for `term` against `field` under a chosen name.
    pub fn term_suggestions_named(
        mut self,
        name: impl Into<String>,
        term: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.suggestions.push(SuggestionRequest {
            name: name.into(),
            term: term.into(),
            field: field.into(),
        });
        self
    }

    /// Logs the compiled query and its timing when it runs.
    pub fn log(mut self) -> Self {
        self.log = true;
        self
    }

    /// The scope.
    pub fn root(&self) -> &RootContext {
        &self.root
    }

    /// Filters in call order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Sort keys in precedence order.
    pub fn sorts(&self) -> &[SortClause] {
        &self.sorts
    }

    /// Items to skip.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The limit, if one was set.
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Aggregation requests in call order.
    pub fn aggregations(&self) -> &[AggregationRequest] {
        &self.aggregations
    }

    /// Suggestion requests in call order.
    pub fn suggestions(&self) -> &[SuggestionRequest] {
        &self.suggestions
    }

    /// Whether `log()` was called.
    pub fn is_logged(&self) -> bool {
        self.log
    }

    /// Checks every clause against the index mapping, reporting the first problem.
    pub fn validate(&self, mapping: &Mapping) -> Result<(), SpecError> {
        validate_spec(self, mapping)
    }

    /// Appends a filter.
    fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Appends a range filter.
    fn range(self, field: impl Into<String>, op: RangeOp, value: impl Into<PropertyValue>) -> Self {
        self.filter(Filter::Range {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    /// Appends a sort key.
    fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(SortClause {
            field: field.into(),
            direction,
        });
        self
    }

    /// Appends an aggregation request.
    fn aggregation(mut self, name: String, field: String, size: Option<u32>) -> Self {
        self.aggregations.push(AggregationRequest { name, field, size });
        self
    }
}
