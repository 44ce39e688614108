//! Typed property values.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A property value of a content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// A string.
    Text(String),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean flag.
    Boolean(bool),
    /// A point in time.
    Date(SystemTime),
    /// The identifier of another record.
    Reference(String),
    /// A multi-valued property.
    List(Vec<Self>),
    /// Opaque binary content; never indexable.
    Binary(Vec<u8>),
    /// Explicitly empty.
    Null,
}

impl PropertyValue {
    /// Short name of the value's type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::Reference(_) => "reference",
            Self::List(_) => "list",
            Self::Binary(_) => "binary",
            Self::Null => "null",
        }
    }

    /// Returns true for `Null` and for empty lists.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.iter().all(Self::is_empty),
            _ => false,
        }
    }

    /// Returns the string content of `Text` and `Reference` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Reference(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<SystemTime> for PropertyValue {
    fn from(value: SystemTime) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}
