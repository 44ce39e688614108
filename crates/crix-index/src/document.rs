//! Document mapping for indexing.
//!
//! The [`DocumentMapper`] flattens a [`ContentRecord`] into an [`IndexDocument`]: system
//! metadata plus the record's mapped properties, coerced to the kind the mapping declares.

use std::{
    collections::BTreeMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crix_config::{FieldKind, Mapping};
use crix_content::{ContentRecord, Dimensions, PropertyValue, RecordKey};
use tantivy::{DateTime, TantivyDocument};
use tracing::debug;

use crate::{IndexError, schema::IndexSchema};

/// Separator between the parts of a document key.
const KEY_SEPARATOR: char = '\u{1f}';

/// A single indexable value, already coerced to its field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Keyword or text value.
    Str(String),
    /// Integer value.
    I64(i64),
    /// Float value.
    F64(f64),
    /// Boolean value.
    Bool(bool),
    /// Date as seconds since the Unix epoch.
    Date(i64),
}

impl FieldValue {
    /// Coerces a scalar property value to `kind`.
    ///
    /// Returns `None` when the value does not fit the kind. Lists, binary values and nulls
    /// never coerce.
    pub fn coerce(kind: FieldKind, value: &PropertyValue) -> Option<Self> {
        match (kind, value) {
            (
                FieldKind::Keyword | FieldKind::Text,
                PropertyValue::Text(s) | PropertyValue::Reference(s),
            ) => Some(Self::Str(s.clone())),
            (FieldKind::Integer, PropertyValue::Integer(i)) => Some(Self::I64(*i)),
            (FieldKind::Float, PropertyValue::Float(f)) => Some(Self::F64(*f)),
            (FieldKind::Float, PropertyValue::Integer(i)) => Some(Self::F64(*i as f64)),
            (FieldKind::Boolean, PropertyValue::Boolean(b)) => Some(Self::Bool(*b)),
            (FieldKind::Date, PropertyValue::Date(t)) => Some(Self::Date(to_epoch_secs(*t))),
            _ => None,
        }
    }
}

/// A record flattened for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Record identifier.
    pub identifier: String,
    /// Upsert key: identifier, workspace and dimensions.
    pub key: String,
    /// Node type.
    pub node_type: String,
    /// Workspace name.
    pub workspace: String,
    /// Serialized dimension vector.
    pub dimensions: String,
    /// Own path.
    pub path: String,
    /// Ancestor paths, nearest first.
    pub parents: Vec<String>,
    /// Mapped property values by property name.
    pub fields: BTreeMap<String, Vec<FieldValue>>,
}

impl IndexDocument {
    /// Converts to a Tantivy document for `schema`.
    ///
    /// Values of properties the schema does not know are ignored.
    pub fn to_tantivy(&self, schema: &IndexSchema) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(schema.identifier, &self.identifier);
        doc.add_text(schema.key, &self.key);
        doc.add_text(schema.node_type, &self.node_type);
        doc.add_text(schema.workspace, &self.workspace);
        doc.add_text(schema.dimensions, &self.dimensions);
        doc.add_text(schema.path, &self.path);
        for parent in &self.parents {
            doc.add_text(schema.parents, parent);
        }

        for (name, values) in &self.fields {
            let Some(property) = schema.property(name) else {
                continue;
            };
            for value in values {
                match value {
                    FieldValue::Str(s) => {
                        doc.add_text(property.raw, s);
                        if let Some(text) = property.text {
                            doc.add_text(text, s);
                        }
                    }
                    FieldValue::I64(i) => doc.add_i64(property.raw, *i),
                    FieldValue::F64(f) => doc.add_f64(property.raw, *f),
                    FieldValue::Bool(b) => doc.add_bool(property.raw, *b),
                    FieldValue::Date(secs) => {
                        doc.add_date(property.raw, DateTime::from_timestamp_secs(*secs));
                    }
                }
            }
        }
        doc
    }
}

/// Maps content records to index documents according to a mapping.
#[derive(Debug, Clone)]
pub struct DocumentMapper {
    /// Property name to field kind.
    mapping: Mapping,
}

impl DocumentMapper {
    /// Creates a mapper for `mapping`.
    pub fn new(mapping: Mapping) -> Self {
        Self { mapping }
    }

    /// The mapping in use.
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Flattens a record.
    ///
    /// Unmapped properties are skipped. A mapped property whose value does not fit its kind
    /// fails the whole record with [`IndexError::UnsupportedFieldType`].
    pub fn map(&self, record: &ContentRecord) -> Result<IndexDocument, IndexError> {
        let mut fields = BTreeMap::new();
        for (name, value) in &record.properties {
            let Some(kind) = self.mapping.kind(name) else {
                debug!(identifier = %record.identifier, property = %name, "Skipping unmapped property");
                continue;
            };

            let mut values = Vec::new();
            collect_values(record, name, kind, value, &mut values)?;
            if !values.is_empty() {
                fields.insert(name.clone(), values);
            }
        }

        Ok(IndexDocument {
            identifier: record.identifier.clone(),
            key: document_key(&record.identifier, &record.workspace, &record.dimensions),
            node_type: record.node_type.clone(),
            workspace: record.workspace.clone(),
            dimensions: record.dimensions.serialize_key(),
            path: record.path.as_str().to_string(),
            parents: record
                .path
                .ancestors()
                .into_iter()
                .map(String::from)
                .collect(),
            fields,
        })
    }
}

/// Coerces one property value, flattening a top-level list.
fn collect_values(
    record: &ContentRecord,
    name: &str,
    kind: FieldKind,
    value: &PropertyValue,
    out: &mut Vec<FieldValue>,
) -> Result<(), IndexError> {
    let unsupported = |value: &PropertyValue| IndexError::UnsupportedFieldType {
        identifier: record.identifier.clone(),
        property: name.to_string(),
        value_type: value.type_name(),
        expected: kind,
    };

    match value {
        PropertyValue::Null => Ok(()),
        PropertyValue::List(items) => {
            for item in items {
                match item {
                    PropertyValue::Null => {}
                    // Nested lists have no field representation
                    PropertyValue::List(_) => return Err(unsupported(item)),
                    scalar => {
                        out.push(FieldValue::coerce(kind, scalar).ok_or_else(|| unsupported(scalar))?)
                    }
                }
            }
            Ok(())
        }
        scalar => {
            out.push(FieldValue::coerce(kind, scalar).ok_or_else(|| unsupported(scalar))?);
            Ok(())
        }
    }
}

/// Builds the upsert key of a record variant.
pub fn document_key(identifier: &str, workspace: &str, dimensions: &Dimensions) -> String {
    format!(
        "{identifier}{KEY_SEPARATOR}{workspace}{KEY_SEPARATOR}{}",
        dimensions.serialize_key()
    )
}

/// Builds the upsert key of a [`RecordKey`].
pub fn record_key(key: &RecordKey) -> String {
    document_key(&key.identifier, &key.workspace, &key.dimensions)
}

/// Converts a point in time to whole seconds since the epoch, rounding down.
pub fn to_epoch_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => {
            let before = before.duration();
            let secs = before.as_secs() + u64::from(before.subsec_nanos() > 0);
            i64::try_from(secs).map_or(i64::MIN, |secs| -secs)
        }
    }
}

/// Converts seconds since the epoch back to a point in time.
pub fn from_epoch_secs(secs: i64) -> SystemTime {
    let magnitude = Duration::from_secs(secs.unsigned_abs());
    if secs >= 0 {
        UNIX_EPOCH + magnitude
    } else {
        UNIX_EPOCH - magnitude
    }
}
