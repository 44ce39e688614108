//! Checks a specification against the index mapping before it runs.

use std::collections::HashSet;

use crix_config::{FieldKind, Mapping};
use crix_content::PropertyValue;

use crate::{QuerySpec, SpecError, clause::Filter};

/// Validates every clause against `mapping`, reporting the first problem found.
pub fn validate_spec(spec: &QuerySpec, mapping: &Mapping) -> Result<(), SpecError> {
    for filter in spec.filters() {
        validate_filter(filter, mapping)?;
    }

    for sort in spec.sorts() {
        mapped_kind(mapping, "sort", &sort.field)?;
    }

    let mut names = HashSet::new();
    for agg in spec.aggregations() {
        if !names.insert(agg.name.as_str()) {
            return Err(SpecError::DuplicateName {
                what: "aggregation",
                name: agg.name.clone(),
            });
        }
        let kind = mapped_kind(mapping, "aggregation", &agg.field)?;
        if matches!(kind, FieldKind::Date | FieldKind::Boolean) {
            return Err(SpecError::NotAggregatable {
                field: agg.field.clone(),
                kind,
            });
        }
        if agg.size == Some(0) {
            return Err(SpecError::ZeroAggregationSize {
                name: agg.name.clone(),
            });
        }
    }

    let mut names = HashSet::new();
    for suggestion in spec.suggestions() {
        if !names.insert(suggestion.name.as_str()) {
            return Err(SpecError::DuplicateName {
                what: "suggestion",
                name: suggestion.name.clone(),
            });
        }
        let kind = mapped_kind(mapping, "suggestion", &suggestion.field)?;
        if !matches!(kind, FieldKind::Keyword | FieldKind::Text) {
            return Err(SpecError::NotSuggestable {
                field: suggestion.field.clone(),
                kind,
            });
        }
    }

    Ok(())
}

/// Validates one filter.
fn validate_filter(filter: &Filter, mapping: &Mapping) -> Result<(), SpecError> {
    match filter {
        Filter::NodeType(node_type) | Filter::ExcludeNodeType(node_type) => {
            if node_type.is_empty() {
                return Err(SpecError::EmptyNodeType);
            }
        }
        Filter::ExactMatch { field, value } => {
            let kind = mapped_kind(mapping, "exact match", field)?;
            check_value(field, kind, value)?;
        }
        Filter::FullText(_) => {
            if mapping.text_properties().next().is_none() {
                return Err(SpecError::NoTextFields);
            }
        }
        Filter::Range { field, value, .. } => {
            let kind = mapped_kind(mapping, "range", field)?;
            if !kind.is_range_capable() {
                return Err(SpecError::NotRangeCapable {
                    field: field.clone(),
                    kind,
                });
            }
            check_value(field, kind, value)?;
        }
    }
    Ok(())
}

/// Looks up the kind of a field named by a clause.
fn mapped_kind(mapping: &Mapping, clause: &'static str, field: &str) -> Result<FieldKind, SpecError> {
    if field.is_empty() {
        return Err(SpecError::EmptyField { clause });
    }
    mapping.kind(field).ok_or_else(|| SpecError::UnknownField {
        clause,
        field: field.to_string(),
    })
}

/// Checks that a scalar filter value fits a field kind.
fn check_value(
    field: &str,
    kind: FieldKind,
    value: &PropertyValue,
) -> Result<(), SpecError> {
    let fits = match kind {
        FieldKind::Keyword | FieldKind::Text => {
            matches!(value, PropertyValue::Text(_) | PropertyValue::Reference(_))
        }
        FieldKind::Integer => matches!(value, PropertyValue::Integer(_)),
        FieldKind::Float => matches!(value, PropertyValue::Float(_) | PropertyValue::Integer(_)),
        FieldKind::Date => matches!(value, PropertyValue::Date(_)),
        FieldKind::Boolean => matches!(value, PropertyValue::Boolean(_)),
    };
    if fits {
        Ok(())
    } else {
        Err(SpecError::IncompatibleValue {
            field: field.to_string(),
            kind,
            value_type: value.type_name(),
        })
    }
}
