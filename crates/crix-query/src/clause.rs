//! Clause types accumulated by a query specification.

use std::fmt;

use crix_content::PropertyValue;

/// Comparison of a range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    /// `field > value`
    GreaterThan,
    /// `field >= value`
    GreaterThanOrEqual,
    /// `field < value`
    LessThan,
    /// `field <= value`
    LessThanOrEqual,
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
        })
    }
}

/// A filter clause. All filters of a query are ANDed and do not score.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Node type equals.
    NodeType(String),
    /// Node type differs.
    ExcludeNodeType(String),
    /// Unanalyzed field equals value.
    ExactMatch {
        /// Property name.
        field: String,
        /// Value to compare with.
        value: PropertyValue,
    },
    /// Every analyzed token of the text occurs in some text field.
    FullText(String),
    /// Ordered comparison on a numeric or date field.
    Range {
        /// Property name.
        field: String,
        /// Comparison.
        op: RangeOp,
        /// Bound.
        value: PropertyValue,
    },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// One sort key. Earlier clauses take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    /// Property name.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

/// A named terms aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    /// Key under which buckets are returned.
    pub name: String,
    /// Property name.
    pub field: String,
    /// Bucket count; the configured default applies when unset.
    pub size: Option<u32>,
}

/// A named term suggestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    /// Key under which suggestion entries are returned.
    pub name: String,
    /// Possibly misspelled input.
    pub term: String,
    /// Property whose terms are searched.
    pub field: String,
}
