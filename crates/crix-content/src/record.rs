//! Content records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Dimensions, NodePath, PropertyValue};

/// Workspace assigned to records that do not name one.
pub const DEFAULT_WORKSPACE: &str = "live";

/// Identifies one variant of a node: identifier, workspace and dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Node identifier.
    pub identifier: String,
    /// Workspace name.
    pub workspace: String,
    /// Dimension vector.
    pub dimensions: Dimensions,
}

/// A content node variant as supplied by the content repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Node identifier, shared by all variants of a node.
    pub identifier: String,
    /// Type tag, e.g. `Acme.Site:Page`.
    pub node_type: String,
    /// Position in the content tree.
    pub path: NodePath,
    /// Properties, ordered by name.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Dimension vector of this variant.
    pub dimensions: Dimensions,
    /// Workspace holding this variant.
    pub workspace: String,
}

impl ContentRecord {
    /// Creates a record with no properties in the default workspace and no dimensions.
    pub fn new(identifier: impl Into<String>, node_type: impl Into<String>, path: NodePath) -> Self {
        Self {
            identifier: identifier.into(),
            node_type: node_type.into(),
            path,
            properties: BTreeMap::new(),
            dimensions: Dimensions::new(),
            workspace: DEFAULT_WORKSPACE.to_string(),
        }
    }

    /// Sets a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Sets the workspace.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Sets the dimension vector.
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Returns a property value.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Returns the key identifying this variant.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            identifier: self.identifier.clone(),
            workspace: self.workspace.clone(),
            dimensions: self.dimensions.clone(),
        }
    }

    /// Creates a translated variant of this node under other dimensions.
    ///
    /// The variant keeps identifier, type, path and workspace. Its properties start empty so
    /// callers set the translated values explicitly.
    pub fn variant(&self, dimensions: Dimensions) -> Self {
        Self {
            identifier: self.identifier.clone(),
            node_type: self.node_type.clone(),
            path: self.path.clone(),
            properties: BTreeMap::new(),
            dimensions,
            workspace: self.workspace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> ContentRecord {
        ContentRecord::new("n1", "Page", NodePath::parse("/sites/demo/n1").unwrap())
            .with_property("title", "egg")
            .with_dimensions(Dimensions::language("en_US"))
    }

    #[test]
    fn test_defaults() {
        let record = ContentRecord::new("n1", "Page", NodePath::root());
        assert_eq!(record.workspace, DEFAULT_WORKSPACE);
        assert!(record.dimensions.is_empty());
        assert!(record.properties.is_empty());
    }

    #[test]
    fn test_variant_shares_identity() {
        let english = page();
        let german = english.variant(Dimensions::language("de")).with_property("title", "Ei");

        assert_eq!(german.identifier, english.identifier);
        assert_eq!(german.path, english.path);
        assert_ne!(german.key(), english.key());
        assert_eq!(german.property("title"), Some(&PropertyValue::from("Ei")));
        assert_eq!(english.property("title"), Some(&PropertyValue::from("egg")));
    }

    #[test]
    fn test_key_order_is_deterministic() {
        let a = page().key();
        let b = page().with_workspace("user-admin").key();
        assert!(a < b);
    }
}
