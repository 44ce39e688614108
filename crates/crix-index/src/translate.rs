//! Query translation: compiles a [`QuerySpec`] into Tantivy queries and collector settings.
//!
//! Every compiled query is confined to the query's root context: descendants of the root path,
//! in the root's workspace and dimension vector. Filters are ANDed with that scope. Apart
//! from full text, filters do not contribute to the score.

use std::ops::Bound;

use crix_config::{FieldKind, Mapping, SearchSettings};
use crix_content::PropertyValue;
use crix_query::{Filter, QuerySpec, RangeOp, SortDirection, SpecError};
use serde_json::{Map, Value, json};
use tantivy::{
    DateTime, Term,
    aggregation::agg_req::Aggregations,
    query::{BooleanQuery, ConstScoreQuery, EmptyQuery, Occur, Query, RangeQuery, TermQuery},
    schema::{Field, IndexRecordOption},
    tokenizer::TextAnalyzer,
};

use crate::{
    IndexError,
    analyzer::{AnalyzedToken, analyze},
    document::FieldValue,
    schema::{IndexSchema, PropertyField, raw_field_name},
};

/// Upper bound on buckets per aggregation.
pub const AGGREGATION_BUCKET_CAP: u32 = 65_000;

/// A compiled sort key.
#[derive(Debug, Clone)]
pub struct CompiledSort {
    /// Property name.
    pub field: String,
    /// Raw field; its fast-field column holds the sort values.
    pub raw: Field,
    /// Mapped kind.
    pub kind: FieldKind,
    /// Direction.
    pub direction: SortDirection,
}

/// A compiled terms aggregation.
#[derive(Debug, Clone)]
pub struct CompiledAggregation {
    /// Key under which buckets are returned.
    pub name: String,
    /// Raw field whose values become bucket keys.
    pub raw: Field,
    /// Mapped kind.
    pub kind: FieldKind,
}

/// A compiled suggestion request.
#[derive(Debug, Clone)]
pub struct CompiledSuggestion {
    /// Key under which entries are returned.
    pub name: String,
    /// Field whose term dictionary is searched.
    pub field: Field,
    /// Input tokens, one entry each.
    pub tokens: Vec<AnalyzedToken>,
}

/// A query ready for the backend.
#[derive(Debug)]
pub struct CompiledQuery {
    /// Scope and filters combined.
    pub query: Box<dyn Query>,
    /// Scope alone, used for scoped suggestion frequencies.
    pub scope: Box<dyn Query>,
    /// Sort keys in precedence order.
    pub sorts: Vec<CompiledSort>,
    /// Hits to skip.
    pub offset: usize,
    /// Records to return.
    pub limit: usize,
    /// Hits to fetch after the offset, larger than `limit` to absorb dropped hits.
    pub fetch: usize,
    /// Terms aggregations, if any were requested.
    pub aggregations: Option<Aggregations>,
    /// Aggregated fields, in request order.
    pub aggregation_fields: Vec<CompiledAggregation>,
    /// Suggestion requests.
    pub suggestions: Vec<CompiledSuggestion>,
    /// Description for query logging, present when the query asked for it.
    pub description: Option<String>,
}

/// Compiles query specifications against one mapping.
#[derive(Clone)]
pub struct QueryTranslator {
    /// Field handles.
    schema: IndexSchema,
    /// Mapping used for validation.
    mapping: Mapping,
    /// Analyzer for full-text and suggestion input.
    analyzer: TextAnalyzer,
    /// Limits and defaults.
    search: SearchSettings,
}

impl QueryTranslator {
    /// Creates a translator.
    pub fn new(
        schema: IndexSchema,
        mapping: Mapping,
        analyzer: TextAnalyzer,
        search: SearchSettings,
    ) -> Self {
        Self {
            schema,
            mapping,
            analyzer,
            search,
        }
    }

    /// Validates and compiles a specification.
    pub fn translate(&self, spec: &QuerySpec) -> Result<CompiledQuery, IndexError> {
        spec.validate(&self.mapping)?;
        let mut analyzer = self.analyzer.clone();

        let scope = self.scope(spec);
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, scope.box_clone())];
        for filter in spec.filters() {
            clauses.push(self.filter(filter, &mut analyzer)?);
        }
        let query: Box<dyn Query> = Box::new(BooleanQuery::new(clauses));

        let sorts = spec
            .sorts()
            .iter()
            .map(|sort| {
                let property = self.property("sort", &sort.field)?;
                Ok(CompiledSort {
                    field: sort.field.clone(),
                    raw: property.raw,
                    kind: property.kind,
                    direction: sort.direction,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        let offset = spec.offset();
        let limit = spec.limit_value().unwrap_or(self.search.default_limit);
        let fetch = limit
            .saturating_mul(self.search.overfetch)
            .min(self.search.max_result_window.saturating_sub(offset));

        let suggestions = spec
            .suggestions()
            .iter()
            .map(|request| {
                let property = self.property("suggestion", &request.field)?;
                let (field, tokens) = match property.text {
                    Some(text) => (text, analyze(&mut analyzer, &request.term)),
                    None => (property.raw, whole_term(&request.term)),
                };
                Ok(CompiledSuggestion {
                    name: request.name.clone(),
                    field,
                    tokens,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        let aggregation_fields = spec
            .aggregations()
            .iter()
            .map(|agg| {
                let property = self.property("aggregation", &agg.field)?;
                Ok(CompiledAggregation {
                    name: agg.name.clone(),
                    raw: property.raw,
                    kind: property.kind,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        Ok(CompiledQuery {
            description: spec.is_logged().then(|| format!("{query:?}")),
            query,
            scope,
            sorts,
            offset,
            limit,
            fetch,
            aggregations: self.aggregations(spec)?,
            aggregation_fields,
            suggestions,
        })
    }

    /// Rejects pages reaching past the configured result window.
    pub fn check_window(&self, compiled: &CompiledQuery) -> Result<(), IndexError> {
        let requested = compiled.offset.saturating_add(compiled.limit);
        if requested > self.search.max_result_window {
            return Err(SpecError::ResultWindowTooLarge {
                requested,
                max: self.search.max_result_window,
            }
            .into());
        }
        Ok(())
    }

    /// Descendants of the root path, in the root's workspace and dimensions.
    fn scope(&self, spec: &QuerySpec) -> Box<dyn Query> {
        let root = spec.root();
        let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
            (Occur::Must, term_query(self.schema.parents, root.path.as_str())),
            (Occur::Must, term_query(self.schema.workspace, &root.workspace)),
            (
                Occur::Must,
                term_query(self.schema.dimensions, &root.dimensions.serialize_key()),
            ),
        ];
        filter_only(Box::new(BooleanQuery::new(clauses)))
    }

    /// Compiles one filter clause.
    fn filter(
        &self,
        filter: &Filter,
        analyzer: &mut TextAnalyzer,
    ) -> Result<(Occur, Box<dyn Query>), IndexError> {
        Ok(match filter {
            Filter::NodeType(node_type) => (
                Occur::Must,
                filter_only(term_query(self.schema.node_type, node_type)),
            ),
            Filter::ExcludeNodeType(node_type) => {
                (Occur::MustNot, term_query(self.schema.node_type, node_type))
            }
            Filter::ExactMatch { field, value } => {
                let property = self.property("exact match", field)?;
                let term = value_term(property.raw, &self.coerce(field, property, value)?);
                (
                    Occur::Must,
                    filter_only(Box::new(TermQuery::new(term, IndexRecordOption::Basic))),
                )
            }
            Filter::FullText(text) => (Occur::Must, self.full_text(text, analyzer)),
            Filter::Range { field, op, value } => {
                let property = self.property("range", field)?;
                let bound = self.coerce(field, property, value)?;
                (Occur::Must, filter_only(range_query(field, *op, bound)?))
            }
        })
    }

    /// Every token must occur in at least one analyzed field.
    fn full_text(&self, text: &str, analyzer: &mut TextAnalyzer) -> Box<dyn Query> {
        let tokens = analyze(analyzer, text);
        if tokens.is_empty() {
            return Box::new(EmptyQuery);
        }

        let fields: Vec<Field> = self.schema.text_fields().collect();
        let per_token: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|token| {
                let alternatives: Vec<(Occur, Box<dyn Query>)> = fields
                    .iter()
                    .map(|field| {
                        let term = Term::from_field_text(*field, &token.text);
                        let query: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                        (Occur::Should, query)
                    })
                    .collect();
                let query: Box<dyn Query> = Box::new(BooleanQuery::new(alternatives));
                (Occur::Must, query)
            })
            .collect();
        Box::new(BooleanQuery::new(per_token))
    }

    /// Builds the terms aggregation request.
    fn aggregations(&self, spec: &QuerySpec) -> Result<Option<Aggregations>, IndexError> {
        if spec.aggregations().is_empty() {
            return Ok(None);
        }

        let mut request = Map::new();
        for agg in spec.aggregations() {
            let size = agg
                .size
                .unwrap_or(self.search.aggregation_size)
                .min(AGGREGATION_BUCKET_CAP);
            request.insert(
                agg.name.clone(),
                json!({ "terms": { "field": raw_field_name(&agg.field), "size": size } }),
            );
        }
        serde_json::from_value(Value::Object(request))
            .map(Some)
            .map_err(|e| IndexError::Translate(format!("aggregation request: {e}")))
    }

    /// Looks up the fields of a property named by a clause.
    fn property(&self, clause: &'static str, field: &str) -> Result<&PropertyField, IndexError> {
        self.schema.property(field).ok_or_else(|| {
            SpecError::UnknownField {
                clause,
                field: field.to_string(),
            }
            .into()
        })
    }

    /// Coerces a filter value to the kind of its field.
    fn coerce(
        &self,
        field: &str,
        property: &PropertyField,
        value: &PropertyValue,
    ) -> Result<FieldValue, IndexError> {
        FieldValue::coerce(property.kind, value).ok_or_else(|| {
            SpecError::IncompatibleValue {
                field: field.to_string(),
                kind: property.kind,
                value_type: value.type_name(),
            }
            .into()
        })
    }
}

/// Wraps a query so it filters without scoring.
fn filter_only(query: Box<dyn Query>) -> Box<dyn Query> {
    Box::new(ConstScoreQuery::new(query, 0.0))
}

/// Exact term query on a string field.
fn term_query(field: Field, text: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, text),
        IndexRecordOption::Basic,
    ))
}

/// Term for a coerced value.
fn value_term(field: Field, value: &FieldValue) -> Term {
    match value {
        FieldValue::Str(s) => Term::from_field_text(field, s),
        FieldValue::I64(i) => Term::from_field_i64(field, *i),
        FieldValue::F64(f) => Term::from_field_f64(field, *f),
        FieldValue::Bool(b) => Term::from_field_bool(field, *b),
        FieldValue::Date(secs) => Term::from_field_date(field, DateTime::from_timestamp_secs(*secs)),
    }
}

/// Converts a comparison into lower and upper bounds.
fn bounds<T: Copy>(op: RangeOp, value: T) -> (Bound<T>, Bound<T>) {
    match op {
        RangeOp::GreaterThan => (Bound::Excluded(value), Bound::Unbounded),
        RangeOp::GreaterThanOrEqual => (Bound::Included(value), Bound::Unbounded),
        RangeOp::LessThan => (Bound::Unbounded, Bound::Excluded(value)),
        RangeOp::LessThanOrEqual => (Bound::Unbounded, Bound::Included(value)),
    }
}

/// Range query on a numeric or date property.
fn range_query(property: &str, op: RangeOp, value: FieldValue) -> Result<Box<dyn Query>, IndexError> {
    let field = raw_field_name(property);
    let query = match value {
        FieldValue::I64(i) => {
            let (lower, upper) = bounds(op, i);
            RangeQuery::new_i64_bounds(field, lower, upper)
        }
        FieldValue::F64(f) => {
            let (lower, upper) = bounds(op, f);
            RangeQuery::new_f64_bounds(field, lower, upper)
        }
        FieldValue::Date(secs) => {
            let (lower, upper) = bounds(op, DateTime::from_timestamp_secs(secs));
            RangeQuery::new_date_bounds(field, lower, upper)
        }
        FieldValue::Str(_) | FieldValue::Bool(_) => {
            return Err(IndexError::Translate(format!(
                "range on non-ordered field '{property}'"
            )));
        }
    };
    Ok(Box::new(query))
}

/// A keyword suggestion input is a single unanalyzed token.
fn whole_term(term: &str) -> Vec<AnalyzedToken> {
    if term.is_empty() {
        return Vec::new();
    }
    vec![AnalyzedToken {
        text: term.to_string(),
        offset: 0,
        length: term.chars().count(),
    }]
}

#[cfg(test)]
mod test {
    use crix_content::{ContentRecord, Dimensions, NodePath};
    use crix_query::RootContext;

    use super::*;
    use crate::analyzer::build_analyzer;

    fn mapping() -> Mapping {
        Mapping::default()
            .with("uriPathSegment", FieldKind::Keyword)
            .with("position", FieldKind::Integer)
    }

    fn translator(search: SearchSettings) -> QueryTranslator {
        let mapping = mapping();
        QueryTranslator::new(
            IndexSchema::new(&mapping),
            mapping,
            build_analyzer(None),
            search,
        )
    }

    fn spec() -> QuerySpec {
        let site = ContentRecord::new("site", "Site", NodePath::parse("/sites/site").unwrap())
            .with_dimensions(Dimensions::language("en_US"));
        QuerySpec::new(RootContext::of(&site))
    }

    #[test]
    fn empty_spec_is_still_scoped() {
        let compiled = translator(SearchSettings::default())
            .translate(&spec())
            .unwrap();
        let description = format!("{:?}", compiled.query);
        assert!(description.contains("/sites/site"));
        assert!(description.contains("language=en_US"));
        assert!(description.contains("live"));
        assert!(compiled.description.is_none());
    }

    #[test]
    fn filters_keep_the_scope_alongside() {
        let compiled = translator(SearchSettings::default())
            .translate(&spec().exact_match("uriPathSegment", "egg"))
            .unwrap();
        let query = format!("{:?}", compiled.query);
        let scope = format!("{:?}", compiled.scope);
        assert!(query.contains(&scope));
        assert!(query.contains("egg"));
        assert!(!scope.contains("egg"));
    }

    #[test]
    fn window_defaults_and_overfetch() {
        let compiled = translator(SearchSettings::default())
            .translate(&spec())
            .unwrap();
        assert_eq!((compiled.offset, compiled.limit, compiled.fetch), (0, 10, 20));

        let compiled = translator(SearchSettings::default())
            .translate(&spec().limit(1).from(5))
            .unwrap();
        assert_eq!((compiled.offset, compiled.limit, compiled.fetch), (5, 1, 2));
    }

    #[test]
    fn fetch_is_capped_by_result_window() {
        let search = SearchSettings {
            max_result_window: 100,
            ..SearchSettings::default()
        };
        let translator = translator(search);
        let compiled = translator.translate(&spec().limit(40).from(50)).unwrap();
        assert_eq!(compiled.fetch, 50);
        assert!(translator.check_window(&compiled).is_ok());

        let compiled = translator.translate(&spec().limit(40).from(80)).unwrap();
        assert!(matches!(
            translator.check_window(&compiled),
            Err(IndexError::MalformedQuerySpec(SpecError::ResultWindowTooLarge {
                requested: 120,
                max: 100
            }))
        ));
    }

    #[test]
    fn invalid_spec_is_malformed() {
        let err = translator(SearchSettings::default())
            .translate(&spec().sort_asc("nope"))
            .unwrap_err();
        assert!(matches!(err, IndexError::MalformedQuerySpec(_)));
    }

    #[test]
    fn sorts_resolve_raw_fields() {
        let translator = translator(SearchSettings::default());
        let compiled = translator
            .translate(&spec().sort_desc("title").sort_asc("position"))
            .unwrap();
        assert_eq!(compiled.sorts.len(), 2);
        assert_eq!(compiled.sorts[0].kind, FieldKind::Text);
        assert_eq!(compiled.sorts[0].direction, SortDirection::Desc);
        assert_eq!(
            compiled.sorts[0].raw,
            translator.schema.property("title").unwrap().raw
        );
        assert_eq!(compiled.sorts[1].field, "position");
    }

    #[test]
    fn aggregation_sizes_are_capped() {
        let compiled = translator(SearchSettings::default())
            .translate(
                &spec()
                    .field_based_aggregation("titleagg", "title")
                    .field_based_aggregation_with_size("big", "position", 100_000),
            )
            .unwrap();
        let aggregations = compiled.aggregations.unwrap();
        let value = serde_json::to_value(&aggregations).unwrap();
        assert_eq!(value["titleagg"]["terms"]["field"], "prop_title");
        assert_eq!(value["titleagg"]["terms"]["size"], 1000);
        assert_eq!(value["big"]["terms"]["size"], AGGREGATION_BUCKET_CAP);

        let fields: Vec<_> = compiled
            .aggregation_fields
            .iter()
            .map(|agg| (agg.name.as_str(), agg.kind))
            .collect();
        assert_eq!(
            fields,
            vec![("titleagg", FieldKind::Text), ("big", FieldKind::Integer)]
        );
    }

    #[test]
    fn suggestion_tokens_follow_field_kind() {
        let translator = translator(SearchSettings::default());
        let compiled = translator
            .translate(
                &spec()
                    .term_suggestions("Chickn EGG", "title")
                    .term_suggestions_named("slug", "Chickn EGG", "uriPathSegment"),
            )
            .unwrap();

        let text = &compiled.suggestions[0];
        assert_eq!(text.field, translator.schema.property("title").unwrap().text.unwrap());
        let tokens: Vec<&str> = text.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(tokens, vec!["chickn", "egg"]);
        assert_eq!(text.tokens[1].offset, 7);

        let keyword = &compiled.suggestions[1];
        assert_eq!(keyword.name, "slug");
        assert_eq!(keyword.tokens.len(), 1);
        assert_eq!(keyword.tokens[0].text, "Chickn EGG");
    }

    #[test]
    fn logged_spec_has_description() {
        let compiled = translator(SearchSettings::default())
            .translate(&spec().node_type("Page").log())
            .unwrap();
        assert!(compiled.description.unwrap().contains("Page"));
    }

    #[test]
    fn range_bounds() {
        assert_eq!(
            bounds(RangeOp::GreaterThan, 1),
            (Bound::Excluded(1), Bound::Unbounded)
        );
        assert_eq!(
            bounds(RangeOp::LessThanOrEqual, 5),
            (Bound::Unbounded, Bound::Included(5))
        );
    }
}
