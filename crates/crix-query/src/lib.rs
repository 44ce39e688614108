//! Query specifications for crix search.
//!
//! A [`QuerySpec`] accumulates the clauses of a search, relative to a [`RootContext`]:
//!
//! - **Filters**: node type, exact match, full text, ranges
//! - **Sorting**: any number of keys, earlier keys first
//! - **Pagination**: `from` and `limit`
//! - **Aggregations**: named terms aggregations over a field
//! - **Suggestions**: named term suggestions for a misspelled input
//!
//! Specs are plain values with no search engine attached. The index crate validates them
//! against the mapping with [`QuerySpec::validate`] and compiles them.
//!
//! # Example
//!
//! ```
//! use crix_config::Mapping;
//! use crix_content::{ContentRecord, NodePath};
//! use crix_query::{QuerySpec, RootContext};
//!
//! let site = ContentRecord::new("site", "Site", NodePath::parse("/sites/demo").unwrap());
//! let spec = QuerySpec::new(RootContext::of(&site))
//!     .node_type("Page")
//!     .exact_match("title", "egg")
//!     .sort_desc("title");
//!
//! assert!(spec.validate(&Mapping::default()).is_ok());
//! ```

#![warn(missing_docs)]

mod clause;
mod error;
mod spec;
mod validate;

pub use clause::{
    AggregationRequest, Filter, RangeOp, SortClause, SortDirection, SuggestionRequest,
};
pub use error::SpecError;
pub use spec::{DEFAULT_SUGGESTION_NAME, QuerySpec, RootContext};
