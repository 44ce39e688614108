//! Error types for the crix-index crate.

use std::{io, time::Duration};

use crix_config::{ConfigError, FieldKind};
use crix_content::RepositoryError;
use crix_query::SpecError;
use thiserror::Error;

/// Errors that can occur when writing to or querying the content index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A record property cannot be represented in its mapped field.
    #[error(
        "record {identifier}: property '{property}' holds a {value_type} value, \
         which cannot be indexed as {expected}"
    )]
    UnsupportedFieldType {
        /// Identifier of the offending record.
        identifier: String,
        /// Property name.
        property: String,
        /// Type name of the value.
        value_type: &'static str,
        /// Kind the property is mapped as.
        expected: FieldKind,
    },

    /// The search backend could not be opened or failed while serving a request.
    #[error("search backend unavailable for index {index}: {message}")]
    BackendUnavailable {
        /// Alias or physical index name.
        index: String,
        /// Error message.
        message: String,
    },

    /// The search backend did not answer in time.
    #[error("search backend did not respond within {timeout:?}")]
    BackendTimeout {
        /// The configured timeout.
        timeout: Duration,
    },

    /// The query specification does not fit the index mapping.
    #[error("malformed query: {0}")]
    MalformedQuerySpec(#[from] SpecError),

    /// The physical index was built with a different mapping or stemmer.
    #[error("index {index} was built with a different mapping; rebuild it")]
    MappingMismatch {
        /// Physical index name.
        index: String,
    },

    /// Neither `index.root` nor a config file location is known.
    #[error("no index root configured")]
    NoIndexRoot,

    /// A validated specification could not be expressed as a backend query.
    #[error("failed to translate query: {0}")]
    Translate(String),

    /// The backend returned a response that could not be interpreted.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// Failed to write to the index.
    #[error("failed to write to index: {0}")]
    Write(String),

    /// Failed to commit changes to the index.
    #[error("failed to commit index: {0}")]
    Commit(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid stemmer language.
    #[error("unsupported stemmer language: {0}")]
    InvalidLanguage(String),

    /// The content repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IndexError {
    /// Creates a `BackendUnavailable` error from an index name and Tantivy error.
    pub(crate) fn backend(index: &str, source: &tantivy::TantivyError) -> Self {
        Self::BackendUnavailable {
            index: index.to_string(),
            message: source.to_string(),
        }
    }

    /// Creates a `Write` error from a Tantivy error.
    pub(crate) fn write(source: &tantivy::TantivyError) -> Self {
        Self::Write(source.to_string())
    }

    /// Creates a `Commit` error from a Tantivy error.
    pub(crate) fn commit(source: &tantivy::TantivyError) -> Self {
        Self::Commit(source.to_string())
    }
}
