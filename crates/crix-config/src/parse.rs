//! Configuration file parsing.
//!
//! Parses individual `.crix.toml` files into intermediate `RawConfig` structures
//! that preserve the optional nature of all fields before merging.

use std::{fs, path::Path};

use serde::Deserialize;
use serde_with::{OneOrMany, serde_as};

use crate::{ConfigError, FieldKind};

/// Raw configuration as parsed directly from a TOML file.
///
/// All fields are optional to support partial configs that will be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// When true, stop discovery here - ignore parent and global configs.
    pub root: Option<bool>,
    /// Index section.
    pub index: Option<RawIndexSettings>,
    /// Search section.
    pub search: Option<RawSearchSettings>,
    /// Suggest section.
    pub suggest: Option<RawSuggestSettings>,
    /// Mapping section.
    pub mapping: Option<RawMapping>,
}

/// Raw index settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIndexSettings {
    /// Alias name.
    pub name: Option<String>,
    /// Index directory, relative to the config file or `~`-prefixed.
    pub root: Option<String>,
    /// Writer memory budget in bytes.
    pub heap_size: Option<usize>,
}

/// Raw search settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchSettings {
    /// Stemming language.
    pub stemmer: Option<String>,
    /// Items per query when no limit is set.
    pub default_limit: Option<usize>,
    /// Maximum `offset + fetched` window.
    pub max_result_window: Option<usize>,
    /// Default buckets per aggregation.
    pub aggregation_size: Option<u32>,
    /// Fetch multiplier before access filtering.
    pub overfetch: Option<usize>,
    /// Backend timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Raw suggest settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSuggestSettings {
    /// Maximum edit distance.
    pub max_edits: Option<u8>,
    /// Required common prefix in characters.
    pub prefix_length: Option<usize>,
    /// Minimum token length for suggestions.
    pub min_word_length: Option<usize>,
    /// Options per token.
    pub size: Option<usize>,
}

/// Raw mapping section: property names grouped by kind.
///
/// Each kind accepts either a single name or a list of names.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMapping {
    /// Exact-match string properties.
    #[serde_as(as = "OneOrMany<_>")]
    pub keyword: Vec<String>,
    /// Analyzed text properties.
    #[serde_as(as = "OneOrMany<_>")]
    pub text: Vec<String>,
    /// Integer properties.
    #[serde_as(as = "OneOrMany<_>")]
    pub integer: Vec<String>,
    /// Float properties.
    #[serde_as(as = "OneOrMany<_>")]
    pub float: Vec<String>,
    /// Date properties.
    #[serde_as(as = "OneOrMany<_>")]
    pub date: Vec<String>,
    /// Boolean properties.
    #[serde_as(as = "OneOrMany<_>")]
    pub boolean: Vec<String>,
}

impl RawMapping {
    /// Returns the declared property names of a kind.
    pub fn properties(&self, kind: FieldKind) -> &[String] {
        match kind {
            FieldKind::Keyword => &self.keyword,
            FieldKind::Text => &self.text,
            FieldKind::Integer => &self.integer,
            FieldKind::Float => &self.float,
            FieldKind::Date => &self.date,
            FieldKind::Boolean => &self.boolean,
        }
    }
}

/// Parses a configuration file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks if a config file has `root = true` set.
///
/// Returns false if the file cannot be read or parsed.
pub fn is_root_config(path: &Path) -> bool {
    parse_config_file(path).is_ok_and(|config| config.root == Some(true))
}
