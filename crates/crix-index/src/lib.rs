//! Tantivy-backed search index for crix content.
//!
//! This crate connects a content repository to an embedded search index:
//! - [`DocumentMapper`] flattens content records into typed index documents
//! - [`IndexWriter`] upserts and deletes documents and owns the physical index lifecycle
//!   (create, alias swap, cleanup)
//! - [`QueryTranslator`] compiles a [`QuerySpec`](crix_query::QuerySpec) into Tantivy queries,
//!   aggregation requests and suggestion descriptors
//! - [`ResultMapper`] resolves raw hits back into records and applies access filtering
//! - [`Searcher`] ties these together behind the fluent [`NodeQuery`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use crix_config::Config;
//! use crix_content::{ContentRecord, MemoryRepository, NodePath};
//! use crix_index::{IndexWriter, Searcher};
//!
//! let site = ContentRecord::new("site", "Site", NodePath::parse("/sites/demo").unwrap());
//! let page = ContentRecord::new("p1", "Page", NodePath::parse("/sites/demo/p1").unwrap())
//!     .with_property("title", "chicken");
//! let repository = Arc::new([site.clone(), page].into_iter().collect::<MemoryRepository>());
//!
//! let config = Config::with_index_root("./index");
//! let mut writer = IndexWriter::open(&config).unwrap();
//! writer.rebuild(repository.as_ref()).unwrap();
//!
//! let searcher = Searcher::open(&config, repository).unwrap();
//! let results = searcher
//!     .query(&site)
//!     .node_type("Page")
//!     .field_based_aggregation("titles", "title")
//!     .execute()
//!     .unwrap();
//! assert_eq!(results.total(), 1);
//! ```

#![warn(missing_docs)]

mod analyzer;
mod backend;
mod document;
mod error;
mod fingerprint;
mod location;
mod query;
mod result;
mod schema;
mod search;
mod status;
mod suggest;
mod translate;
mod writer;

pub use analyzer::{
    AnalyzedToken, CRIX_TOKENIZER, NO_STEMMER, analyze, build_analyzer, build_analyzer_from_name,
    parse_language,
};
pub use backend::{RawHit, RawResponse};
pub use document::{DocumentMapper, FieldValue, IndexDocument, document_key, record_key};
pub use error::IndexError;
pub use fingerprint::{MappingFingerprint, SCHEMA_VERSION, compute_fingerprint};
pub use location::IndexLocation;
pub use query::NodeQuery;
pub use result::{
    AccessFilter, AllowAll, Bucket, BucketKey, ResultMapper, ResultSet, SortValue,
    SuggestionEntry, SuggestionOption,
};
pub use schema::{IndexSchema, PropertyField};
pub use search::Searcher;
pub use status::{IndexStatus, detect_index_status};
pub use translate::{
    AGGREGATION_BUCKET_CAP, CompiledAggregation, CompiledQuery, CompiledSort, CompiledSuggestion,
    QueryTranslator,
};
pub use writer::{IndexStats, IndexWriter};
