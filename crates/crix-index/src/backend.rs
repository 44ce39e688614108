//! Executes compiled queries against a Tantivy searcher.
//!
//! Backend calls run on a worker thread so the caller can give up after the configured
//! timeout. The worker produces a [`RawResponse`]: the total, ordered hits with their
//! identifiers and sort tuples, raw aggregation JSON with the first-seen order of bucket keys,
//! and suggestion entries.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    fmt::Debug,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use crix_config::{FieldKind, SuggestSettings};
use crix_query::SortDirection;
use tantivy::{
    DateTime, DocAddress, DocId, Searcher, SegmentReader, TantivyDocument,
    aggregation::{AggregationCollector, AggregationLimits, agg_result::AggregationResults},
    collector::{Count, DocSetCollector, TopDocs},
    columnar::{Column, DynamicColumn, HasAssociatedColumnType, StrColumn},
    schema::{Field, Value},
};
use tracing::debug;

use crate::{
    IndexError,
    document::from_epoch_secs,
    result::{BucketKey, SortValue, SuggestionEntry},
    schema::IndexSchema,
    suggest::suggest,
    translate::{CompiledQuery, CompiledSort},
};

/// One matching record as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Record identifier.
    pub identifier: String,
    /// Values of the requested sort keys, in request order.
    pub sort_values: Vec<SortValue>,
}

/// Backend response before result mapping.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Number of matching documents, ignoring pagination.
    pub total: u64,
    /// Hits after the offset, in result order.
    pub hits: Vec<RawHit>,
    /// Terms aggregation results, keyed by aggregation name.
    pub aggregations: Option<serde_json::Value>,
    /// Bucket keys per aggregation, in the order their first matching document appears in
    /// the index. Breaks ties between buckets with equal counts.
    pub first_seen: BTreeMap<String, Vec<BucketKey>>,
    /// Suggestion entries per suggestion name, in request order.
    pub suggestions: Vec<(String, Vec<SuggestionEntry>)>,
}

/// Runs `job` on a worker thread, waiting at most `timeout` for its result.
///
/// On timeout the worker is abandoned and finishes on its own.
pub fn run_with_timeout<T, F>(index: &str, timeout: Duration, job: F) -> Result<T, IndexError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IndexError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let _worker = thread::Builder::new()
        .name(format!("crix-query-{index}"))
        .spawn(move || {
            if tx.send(job()).is_err() {
                debug!("Query finished after the caller stopped waiting");
            }
        })
        .map_err(|e| IndexError::BackendUnavailable {
            index: index.to_string(),
            message: format!("failed to spawn query worker: {e}"),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(IndexError::BackendTimeout { timeout }),
        Err(RecvTimeoutError::Disconnected) => Err(IndexError::BackendUnavailable {
            index: index.to_string(),
            message: "query worker stopped without a result".to_string(),
        }),
    }
}

/// Counts matching documents.
pub fn count(searcher: &Searcher, compiled: &CompiledQuery, index: &str) -> Result<u64, IndexError> {
    let total = searcher
        .search(compiled.query.as_ref(), &Count)
        .map_err(|e| IndexError::backend(index, &e))?;
    Ok(total as u64)
}

/// Executes a compiled query: total, the hit window, aggregations and suggestions.
pub fn execute(
    searcher: &Searcher,
    schema: &IndexSchema,
    compiled: &CompiledQuery,
    suggest_settings: &SuggestSettings,
    index: &str,
) -> Result<RawResponse, IndexError> {
    let total = count(searcher, compiled, index)?;

    let hits = if compiled.fetch == 0 || total == 0 {
        Vec::new()
    } else if compiled.sorts.is_empty() {
        relevance_hits(searcher, schema, compiled, index)?
    } else {
        sorted_hits(searcher, schema, compiled, index)?
    };

    let aggregations = match &compiled.aggregations {
        Some(request) => {
            let collector =
                AggregationCollector::from_aggs(request.clone(), AggregationLimits::default());
            let results: AggregationResults = searcher
                .search(compiled.query.as_ref(), &collector)
                .map_err(|e| IndexError::backend(index, &e))?;
            let value = serde_json::to_value(results)
                .map_err(|e| IndexError::InvalidResponse(format!("aggregation result: {e}")))?;
            Some(value)
        }
        None => None,
    };
    let first_seen = if aggregations.is_some() {
        first_seen_keys(searcher, compiled, index)?
    } else {
        BTreeMap::new()
    };

    let suggestions = compiled
        .suggestions
        .iter()
        .map(|request| {
            let entries = suggest(
                searcher,
                compiled.scope.as_ref(),
                request,
                suggest_settings,
                index,
            )?;
            Ok((request.name.clone(), entries))
        })
        .collect::<Result<Vec<_>, IndexError>>()?;

    Ok(RawResponse {
        total,
        hits,
        aggregations,
        first_seen,
        suggestions,
    })
}

/// Hits in score order, ties in index order.
fn relevance_hits(
    searcher: &Searcher,
    schema: &IndexSchema,
    compiled: &CompiledQuery,
    index: &str,
) -> Result<Vec<RawHit>, IndexError> {
    let collector = TopDocs::with_limit(compiled.fetch).and_offset(compiled.offset);
    let top_docs = searcher
        .search(compiled.query.as_ref(), &collector)
        .map_err(|e| IndexError::backend(index, &e))?;

    top_docs
        .into_iter()
        .map(|(_score, address)| {
            let doc = load(searcher, address, index)?;
            Ok(RawHit {
                identifier: identifier(&doc, schema.identifier)?,
                sort_values: Vec::new(),
            })
        })
        .collect()
}

/// Hits ordered by the requested sort keys, ties in index order.
///
/// Sort keys come from fast-field columns; stored documents are loaded only for the
/// returned window.
fn sorted_hits(
    searcher: &Searcher,
    schema: &IndexSchema,
    compiled: &CompiledQuery,
    index: &str,
) -> Result<Vec<RawHit>, IndexError> {
    let addresses = searcher
        .search(compiled.query.as_ref(), &DocSetCollector)
        .map_err(|e| IndexError::backend(index, &e))?;

    let columns = searcher
        .segment_readers()
        .iter()
        .map(|reader| {
            compiled
                .sorts
                .iter()
                .map(|sort| {
                    let name = searcher.schema().get_field_name(sort.raw);
                    SortColumn::open(reader, name, sort.kind)
                })
                .collect::<tantivy::Result<Vec<_>>>()
        })
        .collect::<tantivy::Result<Vec<_>>>()
        .map_err(|e| IndexError::backend(index, &e))?;

    let mut keyed = Vec::with_capacity(addresses.len());
    for address in addresses {
        let segment = columns
            .get(address.segment_ord as usize)
            .ok_or_else(|| IndexError::InvalidResponse("hit in unknown segment".to_string()))?;
        let sort_values = compiled
            .sorts
            .iter()
            .zip(segment)
            .map(|(sort, column)| column.value(address.doc_id, sort.direction, index))
            .collect::<Result<Vec<_>, IndexError>>()?;
        keyed.push((address, sort_values));
    }

    keyed.sort_by(|(address_a, a), (address_b, b)| {
        compare_keys(&compiled.sorts, a, b).then_with(|| address_a.cmp(address_b))
    });
    keyed
        .into_iter()
        .skip(compiled.offset)
        .take(compiled.fetch)
        .map(|(address, sort_values)| {
            let doc = load(searcher, address, index)?;
            Ok(RawHit {
                identifier: identifier(&doc, schema.identifier)?,
                sort_values,
            })
        })
        .collect()
}

/// Fast-field column of one sort key in one segment. `None` when the segment has no values.
enum SortColumn {
    /// Keyword and text values, read through the term dictionary.
    Str(Option<StrColumn>),
    /// Integers.
    I64(Option<Column<i64>>),
    /// Floats.
    F64(Option<Column<f64>>),
    /// Booleans.
    Bool(Option<Column<bool>>),
    /// Dates.
    Date(Option<Column<DateTime>>),
}

impl SortColumn {
    /// Opens the column of field `name` in a segment.
    fn open(reader: &SegmentReader, name: &str, kind: FieldKind) -> tantivy::Result<Self> {
        let fast = reader.fast_fields();
        Ok(match kind {
            FieldKind::Keyword | FieldKind::Text => Self::Str(fast.str(name)?),
            FieldKind::Integer => Self::I64(fast.column_opt(name)?),
            FieldKind::Float => Self::F64(fast.column_opt(name)?),
            FieldKind::Boolean => Self::Bool(fast.column_opt(name)?),
            FieldKind::Date => Self::Date(fast.column_opt(name)?),
        })
    }

    /// Reads the sort value of a document: the smallest value ascending, the largest descending.
    fn value(
        &self,
        doc: DocId,
        direction: SortDirection,
        index: &str,
    ) -> Result<SortValue, IndexError> {
        let value = match self {
            // Term ordinals follow the byte order of the terms
            Self::Str(Some(column)) => match pick(column.term_ords(doc), direction) {
                Some(ord) => Some(SortValue::Str(term_text(column, ord, index)?)),
                None => None,
            },
            Self::Str(None) => None,
            Self::I64(column) => pick_column(column.as_ref(), doc, direction).map(SortValue::I64),
            Self::F64(column) => pick_column(column.as_ref(), doc, direction).map(SortValue::F64),
            Self::Bool(column) => pick_column(column.as_ref(), doc, direction).map(SortValue::Bool),
            Self::Date(column) => pick_column(column.as_ref(), doc, direction)
                .map(|date| SortValue::Date(from_epoch_secs(date.into_timestamp_secs()))),
        };
        Ok(value.unwrap_or(SortValue::Missing))
    }
}

/// Picks the value of a document in a numeric column.
fn pick_column<T>(column: Option<&Column<T>>, doc: DocId, direction: SortDirection) -> Option<T>
where
    T: PartialOrd + Copy + Debug + Send + Sync + 'static,
{
    column.and_then(|column| pick(column.values_for_doc(doc), direction))
}

/// The smallest value ascending, the largest descending.
fn pick<T: PartialOrd>(values: impl Iterator<Item = T>, direction: SortDirection) -> Option<T> {
    values.reduce(|best, value| {
        let better = match direction {
            SortDirection::Asc => value < best,
            SortDirection::Desc => value > best,
        };
        if better { value } else { best }
    })
}

/// Resolves a term ordinal of a string column.
fn term_text(column: &StrColumn, ord: u64, index: &str) -> Result<String, IndexError> {
    let mut term = String::new();
    let found = column
        .ord_to_str(ord, &mut term)
        .map_err(|e| IndexError::backend(index, &e.into()))?;
    if found {
        Ok(term)
    } else {
        Err(IndexError::InvalidResponse(format!("unknown term ordinal {ord}")))
    }
}

/// Bucket keys of every requested aggregation, in the order their first matching document
/// appears in the index.
fn first_seen_keys(
    searcher: &Searcher,
    compiled: &CompiledQuery,
    index: &str,
) -> Result<BTreeMap<String, Vec<BucketKey>>, IndexError> {
    let mut addresses: Vec<DocAddress> = searcher
        .search(compiled.query.as_ref(), &DocSetCollector)
        .map_err(|e| IndexError::backend(index, &e))?
        .into_iter()
        .collect();
    addresses.sort_unstable();

    compiled
        .aggregation_fields
        .iter()
        .map(|agg| {
            let name = searcher.schema().get_field_name(agg.raw);
            let keys = match agg.kind {
                FieldKind::Keyword | FieldKind::Text => {
                    first_seen_terms(searcher, &addresses, name, index)?
                }
                FieldKind::Integer => {
                    first_seen_numbers(searcher, &addresses, name, |v: i64| v as f64, index)?
                }
                FieldKind::Float => {
                    first_seen_numbers(searcher, &addresses, name, |v: f64| v, index)?
                }
                FieldKind::Boolean | FieldKind::Date => Vec::new(),
            };
            Ok((agg.name.clone(), keys))
        })
        .collect()
}

/// First-seen order of the terms of a string field.
fn first_seen_terms(
    searcher: &Searcher,
    addresses: &[DocAddress],
    name: &str,
    index: &str,
) -> Result<Vec<BucketKey>, IndexError> {
    let columns = searcher
        .segment_readers()
        .iter()
        .map(|reader| reader.fast_fields().str(name))
        .collect::<tantivy::Result<Vec<_>>>()
        .map_err(|e| IndexError::backend(index, &e))?;

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for address in addresses {
        let Some(column) = columns.get(address.segment_ord as usize).and_then(Option::as_ref)
        else {
            continue;
        };
        for ord in column.term_ords(address.doc_id) {
            let term = term_text(column, ord, index)?;
            if seen.insert(term.clone()) {
                keys.push(BucketKey::Str(term));
            }
        }
    }
    Ok(keys)
}

/// First-seen order of the values of a numeric field. Keys are compared as `f64`, the way
/// terms aggregations report them.
fn first_seen_numbers<T>(
    searcher: &Searcher,
    addresses: &[DocAddress],
    name: &str,
    to_key: impl Fn(T) -> f64,
    index: &str,
) -> Result<Vec<BucketKey>, IndexError>
where
    T: HasAssociatedColumnType + PartialOrd + Copy + Debug + Send + Sync + 'static,
    DynamicColumn: Into<Option<Column<T>>>,
{
    let columns = searcher
        .segment_readers()
        .iter()
        .map(|reader| reader.fast_fields().column_opt::<T>(name))
        .collect::<tantivy::Result<Vec<_>>>()
        .map_err(|e| IndexError::backend(index, &e))?;

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for address in addresses {
        let Some(column) = columns.get(address.segment_ord as usize).and_then(Option::as_ref)
        else {
            continue;
        };
        for value in column.values_for_doc(address.doc_id) {
            let key = to_key(value);
            if seen.insert(key.to_bits()) {
                keys.push(BucketKey::Number(key));
            }
        }
    }
    Ok(keys)
}

/// Compares two sort tuples key by key. Missing values sort last in both directions.
fn compare_keys(sorts: &[CompiledSort], a: &[SortValue], b: &[SortValue]) -> Ordering {
    for (index, sort) in sorts.iter().enumerate() {
        let ordering = match (a.get(index), b.get(index)) {
            (Some(SortValue::Missing) | None, Some(SortValue::Missing) | None) => Ordering::Equal,
            (Some(SortValue::Missing) | None, _) => Ordering::Greater,
            (_, Some(SortValue::Missing) | None) => Ordering::Less,
            (Some(left), Some(right)) => match sort.direction {
                SortDirection::Asc => compare_values(left, right),
                SortDirection::Desc => compare_values(right, left),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compares two present values of the same kind.
fn compare_values(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
        (SortValue::I64(a), SortValue::I64(b)) => a.cmp(b),
        (SortValue::F64(a), SortValue::F64(b)) => a.total_cmp(b),
        (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
        (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use super::*;

    fn sort(direction: SortDirection) -> CompiledSort {
        CompiledSort {
            field: "title".to_string(),
            raw: Field::from_field_id(0),
            kind: FieldKind::Keyword,
            direction,
        }
    }

    #[test]
    fn timeout_abandons_slow_job() {
        let started = Instant::now();
        let result: Result<(), IndexError> = run_with_timeout("test", Duration::from_millis(50), || {
            thread::sleep(Duration::from_secs(2));
            Ok(())
        });
        assert!(matches!(result, Err(IndexError::BackendTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn fast_job_returns_result() {
        let result = run_with_timeout("test", Duration::from_secs(5), || Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn job_error_is_propagated() {
        let result: Result<(), IndexError> = run_with_timeout("test", Duration::from_secs(5), || {
            Err(IndexError::InvalidResponse("boom".into()))
        });
        assert!(matches!(result, Err(IndexError::InvalidResponse(_))));
    }

    #[test]
    fn panicking_job_is_unavailable() {
        let result: Result<(), IndexError> =
            run_with_timeout("test", Duration::from_secs(5), || panic!("worker failure"));
        assert!(matches!(result, Err(IndexError::BackendUnavailable { .. })));
    }

    #[test]
    fn missing_values_sort_last_both_ways() {
        let present = [SortValue::Str("egg".into())];
        let missing = [SortValue::Missing];
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let sorts = [sort(direction)];
            assert_eq!(compare_keys(&sorts, &present, &missing), Ordering::Less);
            assert_eq!(compare_keys(&sorts, &missing, &present), Ordering::Greater);
        }
    }

    #[test]
    fn secondary_keys_break_ties() {
        let sorts = [sort(SortDirection::Asc), sort(SortDirection::Desc)];
        let a = [SortValue::Str("chicken".into()), SortValue::I64(1)];
        let b = [SortValue::Str("chicken".into()), SortValue::I64(2)];
        assert_eq!(compare_keys(&sorts, &a, &b), Ordering::Greater);
        assert_eq!(compare_keys(&sorts[..1], &a, &b), Ordering::Equal);
        assert_eq!(compare_keys(&sorts, &a, &[]), Ordering::Less);
    }

    #[test]
    fn pick_takes_the_extreme_for_the_direction() {
        assert_eq!(pick([3, 1, 2].into_iter(), SortDirection::Asc), Some(1));
        assert_eq!(pick([3, 1, 2].into_iter(), SortDirection::Desc), Some(3));
        assert_eq!(pick([0.5, -1.5].into_iter(), SortDirection::Asc), Some(-1.5));
        assert_eq!(pick(Vec::<i64>::new().into_iter(), SortDirection::Asc), None);
    }

    #[test]
    fn value_comparison() {
        assert_eq!(
            compare_values(&SortValue::F64(1.5), &SortValue::F64(-2.0)),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&SortValue::Bool(false), &SortValue::Bool(true)),
            Ordering::Less
        );
    }
}
