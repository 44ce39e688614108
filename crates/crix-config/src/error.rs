//! Error types for crix configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use toml::de;

use crate::FieldKind;

/// Errors that can occur when loading or processing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: de::Error,
    },

    /// A property is declared under more than one field kind in the same file.
    #[error("property '{property}' is mapped as both {first} and {second} in {path}")]
    ConflictingMapping {
        /// Name of the property.
        property: String,
        /// First kind the property was declared with.
        first: FieldKind,
        /// Second, conflicting kind.
        second: FieldKind,
        /// Config file containing both declarations.
        path: PathBuf,
    },

    /// A property name cannot be used as an index field.
    #[error("invalid property name '{property}' in {path}")]
    InvalidPropertyName {
        /// The rejected property name.
        property: String,
        /// Config file declaring it.
        path: PathBuf,
    },

    /// A setting has a value outside its valid range.
    #[error("invalid value for {name}: {message}")]
    InvalidSetting {
        /// Dotted setting name, e.g. `search.overfetch`.
        name: &'static str,
        /// What is wrong with the value.
        message: String,
    },

    /// Failed to determine home directory.
    #[error("could not determine home directory")]
    NoHomeDirectory,
}
