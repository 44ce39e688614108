//! Result types and the mapping from raw backend responses to them.
//!
//! The [`ResultMapper`] resolves raw hits back into content records through the content
//! repository, drops hits that no longer resolve or that the [`AccessFilter`] hides, and
//! truncates to the requested limit. The resulting [`ResultSet`] also carries per-record
//! sort values, aggregation buckets and suggestion entries.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
    slice,
    time::SystemTime,
};

use crix_content::{ContentRecord, ContentRepository};
use crix_query::RootContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{IndexError, backend::RawResponse};

/// The value of one sort key for one result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SortValue {
    /// Keyword or text value.
    Str(String),
    /// Integer value.
    I64(i64),
    /// Float value.
    F64(f64),
    /// Boolean value.
    Bool(bool),
    /// Date value.
    Date(SystemTime),
    /// The record has no value for the key.
    Missing,
}

/// The key of an aggregation bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketKey {
    /// A string term.
    Str(String),
    /// A numeric term.
    Number(f64),
}

impl BucketKey {
    /// Returns the string key, if this is a string bucket.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

/// One aggregation bucket: a field value and how many matching records have it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// The field value.
    pub key: BucketKey,
    /// Number of matching records with this value.
    pub doc_count: u64,
}

/// Raw terms aggregation result as returned by the backend.
#[derive(Debug, Deserialize)]
struct TermsResult {
    /// Buckets in backend order.
    buckets: Vec<Bucket>,
}

/// One suggestion option for an input token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionOption {
    /// Suggested term.
    pub text: String,
    /// Number of records in scope containing the term.
    pub freq: u64,
    /// Similarity to the input token, between 0 and 1.
    pub score: f32,
}

/// Suggestions for one token of the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionEntry {
    /// The analyzed token.
    pub text: String,
    /// Character offset of the token in the input.
    pub offset: usize,
    /// Length of the token in the input, in characters.
    pub length: usize,
    /// Options, best first.
    pub options: Vec<SuggestionOption>,
}

/// Decides whether a resolved record may be returned to the caller.
pub trait AccessFilter: Send + Sync {
    /// Returns true if `record` is visible.
    fn is_visible(&self, record: &ContentRecord) -> bool;
}

/// Access filter that hides nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessFilter for AllowAll {
    fn is_visible(&self, _record: &ContentRecord) -> bool {
        true
    }
}

impl<F> AccessFilter for F
where
    F: Fn(&ContentRecord) -> bool + Send + Sync,
{
    fn is_visible(&self, record: &ContentRecord) -> bool {
        self(record)
    }
}

/// The typed result of executing a query.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// Backend total, ignoring pagination and access filtering.
    total: u64,
    /// Resolved, visible records in result order.
    records: Vec<ContentRecord>,
    /// Sort values, parallel to `records`.
    sort_values: Vec<Vec<SortValue>>,
    /// Buckets by aggregation name.
    aggregations: BTreeMap<String, Vec<Bucket>>,
    /// Suggestion entries by suggestion name.
    suggestions: BTreeMap<String, Vec<SuggestionEntry>>,
}

impl ResultSet {
    /// Number of matching records, ignoring `from`, `limit` and access filtering.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of records actually returned after identifier resolution and access filtering.
    pub fn accessible_count(&self) -> usize {
        self.records.len()
    }

    /// Number of returned records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record was returned.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The first returned record.
    pub fn first(&self) -> Option<&ContentRecord> {
        self.records.first()
    }

    /// Iterates returned records in result order.
    pub fn iter(&self) -> slice::Iter<'_, ContentRecord> {
        self.records.iter()
    }

    /// Returned records in result order.
    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    /// Consumes the set, returning its records.
    pub fn into_records(self) -> Vec<ContentRecord> {
        self.records
    }

    /// Sort values of a returned record, in the order of the requested sort keys.
    ///
    /// Returns `None` if the record is not part of this result set.
    pub fn sort_values_for(&self, record: &ContentRecord) -> Option<&[SortValue]> {
        let key = record.key();
        self.records
            .iter()
            .position(|candidate| candidate.key() == key)
            .and_then(|index| self.sort_values.get(index))
            .map(Vec::as_slice)
    }

    /// All aggregation results by name.
    pub fn aggregations(&self) -> &BTreeMap<String, Vec<Bucket>> {
        &self.aggregations
    }

    /// Buckets of one aggregation.
    pub fn aggregation(&self, name: &str) -> Option<&[Bucket]> {
        self.aggregations.get(name).map(Vec::as_slice)
    }

    /// All suggestion results by name.
    pub fn suggestions(&self) -> &BTreeMap<String, Vec<SuggestionEntry>> {
        &self.suggestions
    }

    /// The entry for the first token of a suggestion.
    pub fn suggestion(&self, name: &str) -> Option<&SuggestionEntry> {
        self.suggestions.get(name).and_then(|entries| entries.first())
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ContentRecord;
    type IntoIter = slice::Iter<'a, ContentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Turns raw backend responses into result sets.
pub struct ResultMapper<'a> {
    /// Resolves hit identifiers into records.
    repository: &'a dyn ContentRepository,
    /// Decides visibility of resolved records.
    access: &'a dyn AccessFilter,
}

impl<'a> ResultMapper<'a> {
    /// Creates a mapper resolving through `repository` and filtering with `access`.
    pub fn new(repository: &'a dyn ContentRepository, access: &'a dyn AccessFilter) -> Self {
        Self { repository, access }
    }

    /// Maps a raw response, keeping at most `limit` records.
    ///
    /// Hits are resolved in the workspace and dimensions of `root`, preserving backend
    /// order. Unresolvable and hidden hits are dropped; the next hits of the overfetched
    /// window take their place.
    pub fn map(
        &self,
        root: &RootContext,
        limit: usize,
        response: RawResponse,
    ) -> Result<ResultSet, IndexError> {
        let mut records = Vec::new();
        let mut sort_values = Vec::new();
        for hit in response.hits {
            if records.len() >= limit {
                break;
            }
            let Some(record) =
                self.repository
                    .find(&hit.identifier, &root.workspace, &root.dimensions)?
            else {
                warn!(identifier = %hit.identifier, "Dropping hit that no longer resolves to a record");
                continue;
            };
            if !self.access.is_visible(&record) {
                debug!(identifier = %hit.identifier, "Dropping hit hidden by access filter");
                continue;
            }
            records.push(record);
            sort_values.push(hit.sort_values);
        }

        let aggregations = match response.aggregations {
            Some(raw) => map_aggregations(raw, &response.first_seen)?,
            None => BTreeMap::new(),
        };

        Ok(ResultSet {
            total: response.total,
            records,
            sort_values,
            aggregations,
            suggestions: response.suggestions.into_iter().collect(),
        })
    }
}

/// Parses terms aggregation results, ordering buckets by descending count.
///
/// Buckets with equal counts are ordered by where their key was first seen in the index.
fn map_aggregations(
    raw: serde_json::Value,
    first_seen: &BTreeMap<String, Vec<BucketKey>>,
) -> Result<BTreeMap<String, Vec<Bucket>>, IndexError> {
    let results: BTreeMap<String, TermsResult> = serde_json::from_value(raw)
        .map_err(|e| IndexError::InvalidResponse(format!("aggregation result: {e}")))?;
    Ok(results
        .into_iter()
        .map(|(name, mut result)| {
            let rank: HashMap<KeyIdentity<'_>, usize> = first_seen
                .get(&name)
                .into_iter()
                .flatten()
                .enumerate()
                .map(|(position, key)| (KeyIdentity::of(key), position))
                .collect();
            result.buckets.sort_by_cached_key(|bucket| {
                let position = rank
                    .get(&KeyIdentity::of(&bucket.key))
                    .copied()
                    .unwrap_or(usize::MAX);
                (Reverse(bucket.doc_count), position)
            });
            (name, result.buckets)
        })
        .collect())
}

/// Hashable view of a bucket key. Numbers compare by bit pattern.
#[derive(PartialEq, Eq, Hash)]
enum KeyIdentity<'k> {
    /// A string term.
    Str(&'k str),
    /// The bits of a numeric term.
    Number(u64),
}

impl<'k> KeyIdentity<'k> {
    /// Identity of `key`.
    fn of(key: &'k BucketKey) -> Self {
        match key {
            BucketKey::Str(s) => Self::Str(s),
            BucketKey::Number(n) => Self::Number(n.to_bits()),
        }
    }
}

#[cfg(test)]
mod test {
    use crix_content::{Dimensions, MemoryRepository, NodePath};
    use serde_json::json;

    use super::*;
    use crate::backend::RawHit;

    fn page(identifier: &str) -> ContentRecord {
        ContentRecord::new(
            identifier,
            "Page",
            NodePath::parse(&format!("/sites/site/{identifier}")).unwrap(),
        )
        .with_dimensions(Dimensions::language("en_US"))
        .with_property("title", identifier)
    }

    fn root() -> RootContext {
        RootContext::of(
            &ContentRecord::new("site", "Site", NodePath::parse("/sites/site").unwrap())
                .with_dimensions(Dimensions::language("en_US")),
        )
    }

    fn repository() -> MemoryRepository {
        ["a", "b", "c"].into_iter().map(page).collect()
    }

    fn hit(identifier: &str) -> RawHit {
        RawHit {
            identifier: identifier.to_string(),
            sort_values: vec![SortValue::Str(identifier.to_string())],
        }
    }

    fn response(hits: &[&str]) -> RawResponse {
        RawResponse {
            total: 10,
            hits: hits.iter().map(|id| hit(id)).collect(),
            ..RawResponse::default()
        }
    }

    #[test]
    fn preserves_order_and_sort_values() {
        let repository = repository();
        let mapper = ResultMapper::new(&repository, &AllowAll);
        let set = mapper.map(&root(), 10, response(&["c", "a"])).unwrap();

        let ids: Vec<&str> = set.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(set.total(), 10);
        assert_eq!(
            set.sort_values_for(&page("a")),
            Some(&[SortValue::Str("a".into())][..])
        );
        assert_eq!(set.sort_values_for(&page("b")), None);
    }

    #[test]
    fn truncates_to_limit() {
        let repository = repository();
        let mapper = ResultMapper::new(&repository, &AllowAll);
        let set = mapper.map(&root(), 2, response(&["a", "b", "c"])).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.accessible_count(), 2);
    }

    #[test]
    fn drops_unresolvable_hits() {
        let repository = repository();
        let mapper = ResultMapper::new(&repository, &AllowAll);
        let set = mapper
            .map(&root(), 2, response(&["gone", "a", "b", "c"]))
            .unwrap();
        let ids: Vec<&str> = set.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn resolves_in_root_dimensions() {
        let repository = repository();
        let german = RootContext {
            dimensions: Dimensions::language("de"),
            ..root()
        };
        let set = ResultMapper::new(&repository, &AllowAll)
            .map(&german, 10, response(&["a"]))
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn access_filter_hides_records() {
        let repository = repository();
        let hide_b = |record: &ContentRecord| record.identifier != "b";
        let mapper = ResultMapper::new(&repository, &hide_b);
        let set = mapper.map(&root(), 10, response(&["a", "b", "c"])).unwrap();
        assert_eq!(set.accessible_count(), 2);
        assert_eq!(set.total(), 10);
        assert!(set.iter().all(|r| r.identifier != "b"));
    }

    #[test]
    fn aggregation_buckets_sorted_by_count() {
        let repository = repository();
        let mut raw = response(&[]);
        raw.aggregations = Some(json!({
            "titleagg": {
                "buckets": [
                    {"key": "egg", "doc_count": 1},
                    {"key": "chicken", "doc_count": 2},
                    {"key": "duck", "doc_count": 1}
                ],
                "sum_other_doc_count": 0,
                "doc_count_error_upper_bound": 0
            },
            "positions": {"buckets": [{"key": 3.0, "doc_count": 1}]}
        }));

        let set = ResultMapper::new(&repository, &AllowAll)
            .map(&root(), 10, raw)
            .unwrap();
        let buckets = set.aggregation("titleagg").unwrap();
        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["chicken", "egg", "duck"]);
        assert_eq!(buckets[0].doc_count, 2);
        assert_eq!(
            set.aggregation("positions").unwrap()[0].key,
            BucketKey::Number(3.0)
        );
        assert!(set.aggregation("missing").is_none());
    }

    #[test]
    fn equal_counts_follow_first_seen_order() {
        let repository = repository();
        let mut raw = response(&[]);
        raw.aggregations = Some(json!({
            "titleagg": {"buckets": [
                {"key": "apple", "doc_count": 1},
                {"key": "mango", "doc_count": 1},
                {"key": "pear", "doc_count": 2},
                {"key": "zebra", "doc_count": 1}
            ]},
            "positions": {"buckets": [
                {"key": 1.0, "doc_count": 1},
                {"key": 2.0, "doc_count": 1},
                {"key": 3.0, "doc_count": 1}
            ]}
        }));
        raw.first_seen = BTreeMap::from([
            (
                "titleagg".to_string(),
                ["zebra", "pear", "apple", "mango"]
                    .into_iter()
                    .map(|key| BucketKey::Str(key.to_string()))
                    .collect(),
            ),
            (
                "positions".to_string(),
                vec![
                    BucketKey::Number(3.0),
                    BucketKey::Number(1.0),
                    BucketKey::Number(2.0),
                ],
            ),
        ]);

        let set = ResultMapper::new(&repository, &AllowAll)
            .map(&root(), 10, raw)
            .unwrap();
        let keys: Vec<_> = set
            .aggregation("titleagg")
            .unwrap()
            .iter()
            .map(|b| b.key.as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["pear", "zebra", "apple", "mango"]);
        let positions: Vec<_> = set
            .aggregation("positions")
            .unwrap()
            .iter()
            .map(|b| b.key.clone())
            .collect();
        assert_eq!(
            positions,
            vec![
                BucketKey::Number(3.0),
                BucketKey::Number(1.0),
                BucketKey::Number(2.0)
            ]
        );
    }

    #[test]
    fn malformed_aggregation_is_invalid_response() {
        let repository = repository();
        let mut raw = response(&[]);
        raw.aggregations = Some(json!({"titleagg": {"value": 3}}));
        let err = ResultMapper::new(&repository, &AllowAll)
            .map(&root(), 10, raw)
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidResponse(_)));
    }

    #[test]
    fn suggestions_pass_through() {
        let repository = repository();
        let mut raw = response(&[]);
        raw.suggestions = vec![(
            "suggestions".to_string(),
            vec![SuggestionEntry {
                text: "chickn".into(),
                offset: 0,
                length: 6,
                options: vec![SuggestionOption {
                    text: "chicken".into(),
                    freq: 2,
                    score: 0.8,
                }],
            }],
        )];
        let set = ResultMapper::new(&repository, &AllowAll)
            .map(&root(), 10, raw)
            .unwrap();
        let entry = set.suggestion("suggestions").unwrap();
        assert_eq!(entry.options[0].text, "chicken");
        assert_eq!(entry.options[0].freq, 2);
    }

    #[test]
    fn bucket_serializes_with_key_and_doc_count() {
        let bucket = Bucket {
            key: BucketKey::Str("chicken".into()),
            doc_count: 2,
        };
        assert_eq!(
            serde_json::to_value(&bucket).unwrap(),
            json!({"key": "chicken", "doc_count": 2})
        );
    }
}
