//! Content dimension vectors.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Name of the dimension carrying the content language.
pub const LANGUAGE: &str = "language";

/// A dimension vector, e.g. `language=en_US`.
///
/// Two records are variants of the same node when they share an identifier and workspace but
/// differ in dimensions. Dimensions are kept sorted by name so their serialized form is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dimensions(BTreeMap<String, String>);

impl Dimensions {
    /// Creates an empty dimension vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a vector holding only a language.
    pub fn language(value: impl Into<String>) -> Self {
        Self::new().with(LANGUAGE, value)
    }

    /// Sets a dimension value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Returns the value of a dimension.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterates dimensions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if no dimension is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes to `name=value;name=value`, the form stored in the index.
    pub fn serialize_key(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&self.serialize_key())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_key_is_ordered() {
        let dims = Dimensions::new()
            .with("market", "eu")
            .with(LANGUAGE, "de");
        assert_eq!(dims.serialize_key(), "language=de;market=eu");
    }

    #[test]
    fn test_empty_dimensions() {
        let dims = Dimensions::new();
        assert_eq!(dims.serialize_key(), "");
        assert_eq!(dims.to_string(), "(none)");
    }

    #[test]
    fn test_language_shorthand() {
        let dims = Dimensions::language("en_US");
        assert_eq!(dims.get(LANGUAGE), Some("en_US"));
        assert_ne!(dims, Dimensions::language("de"));
    }
}
