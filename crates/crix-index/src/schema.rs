//! Index schema derived from the property mapping.
//!
//! Every record carries a fixed set of system fields:
//! - `meta_identifier`: record identifier (string, stored)
//! - `meta_key`: identifier, workspace and dimensions joined; one document per key
//! - `meta_type`: node type (string, stored)
//! - `meta_workspace`: workspace name (string, stored)
//! - `meta_dimensions`: serialized dimension vector (string, stored)
//! - `meta_parents`: every ancestor path, for subtree scoping (string, multi-valued)
//! - `meta_path`: the record's own path (string, stored)
//!
//! Each mapped property `<name>` adds a raw field `prop_<name>` typed by its kind. `text`
//! properties also get an analyzed companion `text_<name>` for full-text filters and
//! suggestions, while the raw field serves exact matches, sorting and aggregations.

use std::collections::BTreeMap;

use crix_config::{FieldKind, Mapping};
use tantivy::schema::{
    DateOptions, FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema,
    TextFieldIndexing, TextOptions,
};

use crate::analyzer::CRIX_TOKENIZER;

/// Prefix of raw property field names.
pub const RAW_PREFIX: &str = "prop_";

/// Prefix of analyzed property field names.
pub const TEXT_PREFIX: &str = "text_";

/// Fields backing one mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyField {
    /// Mapped kind.
    pub kind: FieldKind,
    /// Unanalyzed field: exact match, sort, aggregation.
    pub raw: Field,
    /// Analyzed field, present for `text` properties only.
    pub text: Option<Field>,
}

/// Handles to all fields in the index schema.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    /// The underlying Tantivy schema.
    schema: Schema,
    /// Record identifier.
    pub identifier: Field,
    /// Unique document key per record variant.
    pub key: Field,
    /// Node type.
    pub node_type: Field,
    /// Workspace name.
    pub workspace: Field,
    /// Serialized dimension vector.
    pub dimensions: Field,
    /// Ancestor paths.
    pub parents: Field,
    /// Own path.
    pub path: Field,
    /// Mapped properties by name.
    properties: BTreeMap<String, PropertyField>,
}

impl IndexSchema {
    /// Builds the schema for a mapping.
    pub fn new(mapping: &Mapping) -> Self {
        let mut builder = Schema::builder();

        let identifier = builder.add_text_field("meta_identifier", STRING | STORED);
        let key = builder.add_text_field("meta_key", STRING);
        let node_type = builder.add_text_field("meta_type", STRING | STORED);
        let workspace = builder.add_text_field("meta_workspace", STRING | STORED);
        let dimensions = builder.add_text_field("meta_dimensions", STRING | STORED);
        let parents = builder.add_text_field("meta_parents", STRING);
        let path = builder.add_text_field("meta_path", STRING | STORED);

        let mut properties = BTreeMap::new();
        for (name, kind) in mapping.iter() {
            let raw_name = raw_field_name(name);
            let raw = match kind {
                FieldKind::Keyword | FieldKind::Text => {
                    builder.add_text_field(&raw_name, STRING | STORED | FAST)
                }
                FieldKind::Integer => builder.add_i64_field(&raw_name, INDEXED | STORED | FAST),
                FieldKind::Float => builder.add_f64_field(&raw_name, INDEXED | STORED | FAST),
                FieldKind::Date => builder.add_date_field(
                    &raw_name,
                    DateOptions::default()
                        .set_indexed()
                        .set_stored()
                        .set_fast(),
                ),
                FieldKind::Boolean => builder.add_bool_field(&raw_name, INDEXED | STORED | FAST),
            };

            // Analyzed companion: positions for phrase-capable matching, not stored
            let text = (kind == FieldKind::Text).then(|| {
                let options = TextOptions::default().set_indexing_options(
                    TextFieldIndexing::default()
                        .set_tokenizer(CRIX_TOKENIZER)
                        .set_index_option(IndexRecordOption::WithFreqsAndPositions),
                );
                builder.add_text_field(&format!("{TEXT_PREFIX}{name}"), options)
            });

            properties.insert(name.to_string(), PropertyField { kind, raw, text });
        }

        Self {
            schema: builder.build(),
            identifier,
            key,
            node_type,
            workspace,
            dimensions,
            parents,
            path,
            properties,
        }
    }

    /// Returns a reference to the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the fields of a mapped property.
    pub fn property(&self, name: &str) -> Option<&PropertyField> {
        self.properties.get(name)
    }

    /// Iterates mapped properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyField)> {
        self.properties.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Iterates the analyzed fields of all `text` properties.
    pub fn text_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.properties.values().filter_map(|field| field.text)
    }
}

/// Name of the raw field backing a property, as used by aggregations.
pub fn raw_field_name(property: &str) -> String {
    format!("{RAW_PREFIX}{property}")
}

#[cfg(test)]
mod test {
    use tantivy::schema::FieldType;

    use super::*;

    fn mapping() -> Mapping {
        Mapping::empty()
            .with("title", FieldKind::Text)
            .with("uriPathSegment", FieldKind::Keyword)
            .with("position", FieldKind::Integer)
            .with("price", FieldKind::Float)
            .with("published", FieldKind::Date)
            .with("hidden", FieldKind::Boolean)
    }

    #[test]
    fn schema_has_system_fields() {
        let schema = IndexSchema::new(&Mapping::empty());
        let tantivy_schema = schema.schema();

        for name in [
            "meta_identifier",
            "meta_key",
            "meta_type",
            "meta_workspace",
            "meta_dimensions",
            "meta_parents",
            "meta_path",
        ] {
            assert!(tantivy_schema.get_field(name).is_ok(), "missing {name}");
        }
        assert_eq!(schema.properties().count(), 0);
    }

    #[test]
    fn key_is_indexed_but_not_stored() {
        let schema = IndexSchema::new(&Mapping::empty());
        let entry = schema.schema().get_field_entry(schema.key);
        assert!(entry.is_indexed());
        assert!(!entry.is_stored());
    }

    #[test]
    fn property_fields_follow_kind() {
        let schema = IndexSchema::new(&mapping());
        let tantivy_schema = schema.schema();

        let expect = |name: &str, check: fn(&FieldType) -> bool| {
            let field = schema.property(name).unwrap();
            let entry = tantivy_schema.get_field_entry(field.raw);
            assert_eq!(entry.name(), raw_field_name(name));
            assert!(entry.is_stored(), "{name} should be stored");
            assert!(entry.is_fast(), "{name} should be fast");
            assert!(check(entry.field_type()), "{name} has wrong type");
        };

        expect("title", |t| matches!(t, FieldType::Str(_)));
        expect("uriPathSegment", |t| matches!(t, FieldType::Str(_)));
        expect("position", |t| matches!(t, FieldType::I64(_)));
        expect("price", |t| matches!(t, FieldType::F64(_)));
        expect("published", |t| matches!(t, FieldType::Date(_)));
        expect("hidden", |t| matches!(t, FieldType::Bool(_)));
    }

    #[test]
    fn raw_string_fields_are_untokenized() {
        let schema = IndexSchema::new(&mapping());
        let raw = schema.property("title").unwrap().raw;
        if let FieldType::Str(opts) = schema.schema().get_field_entry(raw).field_type() {
            assert_eq!(opts.get_indexing_options().unwrap().tokenizer(), "raw");
        } else {
            panic!("title raw field should be text type");
        }
    }

    #[test]
    fn only_text_properties_have_analyzed_fields() {
        let schema = IndexSchema::new(&mapping());

        let title = schema.property("title").unwrap();
        let text = title.text.unwrap();
        let entry = schema.schema().get_field_entry(text);
        assert_eq!(entry.name(), "text_title");
        assert!(!entry.is_stored());
        if let FieldType::Str(opts) = entry.field_type() {
            let indexing = opts.get_indexing_options().unwrap();
            assert_eq!(indexing.tokenizer(), CRIX_TOKENIZER);
            assert_eq!(
                indexing.index_option(),
                IndexRecordOption::WithFreqsAndPositions
            );
        } else {
            panic!("text_title should be text type");
        }

        assert!(schema.property("uriPathSegment").unwrap().text.is_none());
        assert_eq!(schema.text_fields().count(), 1);
    }

    #[test]
    fn unmapped_property_has_no_fields() {
        let schema = IndexSchema::new(&mapping());
        assert!(schema.property("unknown").is_none());
    }
}
