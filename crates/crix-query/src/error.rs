//! Error types for query specification validation.

use crix_config::FieldKind;
use thiserror::Error;

/// Reasons a query specification cannot be executed against a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A clause names an empty field.
    #[error("{clause} clause has an empty field name")]
    EmptyField {
        /// Clause kind, e.g. `sort`.
        clause: &'static str,
    },

    /// A type filter names an empty type.
    #[error("node type filter is empty")]
    EmptyNodeType,

    /// A clause names a field that is not mapped.
    #[error("{clause} on unknown field '{field}'")]
    UnknownField {
        /// Clause kind.
        clause: &'static str,
        /// The unmapped field.
        field: String,
    },

    /// A range filter targets a field that has no ordering.
    #[error("range filter on {kind} field '{field}'; only integer, float and date support ranges")]
    NotRangeCapable {
        /// The field.
        field: String,
        /// Its mapped kind.
        kind: FieldKind,
    },

    /// An aggregation targets a field kind that cannot be bucketed.
    #[error("aggregation on {kind} field '{field}' is not supported")]
    NotAggregatable {
        /// The field.
        field: String,
        /// Its mapped kind.
        kind: FieldKind,
    },

    /// A suggestion targets a field without terms.
    #[error("term suggestions on {kind} field '{field}'; only keyword and text fields have terms")]
    NotSuggestable {
        /// The field.
        field: String,
        /// Its mapped kind.
        kind: FieldKind,
    },

    /// A full-text filter was requested but no `text` field is mapped.
    #[error("full-text filter requires at least one text field in the mapping")]
    NoTextFields,

    /// Two aggregations or two suggestions share a name.
    #[error("duplicate {what} name '{name}'")]
    DuplicateName {
        /// `aggregation` or `suggestion`.
        what: &'static str,
        /// The repeated name.
        name: String,
    },

    /// An aggregation asked for zero buckets.
    #[error("aggregation '{name}' has size 0")]
    ZeroAggregationSize {
        /// Aggregation name.
        name: String,
    },

    /// A filter value does not fit the field kind.
    #[error("{value_type} value is not valid for {kind} field '{field}'")]
    IncompatibleValue {
        /// The field.
        field: String,
        /// Its mapped kind.
        kind: FieldKind,
        /// Type name of the offending value.
        value_type: &'static str,
    },

    /// `from + limit` exceeds the configured result window.
    #[error("result window {requested} exceeds the maximum of {max}")]
    ResultWindowTooLarge {
        /// `from + limit` of the query.
        requested: usize,
        /// Configured maximum.
        max: usize,
    },
}
