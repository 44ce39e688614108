//! Configuration system for crix.
//!
//! crix uses TOML configuration files named `.crix.toml`. Configuration is resolved by walking
//! up the directory tree from a starting directory, collecting any `.crix.toml` files found,
//! then loading `~/.crix.toml` as the global config with lowest precedence.
//!
//! The configuration covers where indices live, query defaults, term suggester tuning, and
//! the property mapping that decides how content properties become index fields.

#![warn(missing_docs)]

mod discovery;
mod error;
mod merge;
mod parse;
mod resolve;
#[cfg(test)]
mod test_support;

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

pub use discovery::{CONFIG_FILENAME, discover_config_files, global_config_path, is_global_config};
pub use error::ConfigError;
pub use merge::{ParsedConfig, merge_configs};
pub use parse::{
    RawConfig, RawIndexSettings, RawMapping, RawSearchSettings, RawSuggestSettings,
    parse_config_file, parse_config_str,
};
pub use resolve::resolve_index_root;
use serde::{Deserialize, Serialize};

/// Top-level merged configuration for crix.
///
/// This represents the fully resolved configuration after merging all discovered `.crix.toml`
/// files according to precedence rules.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Index location and writer settings.
    pub index: IndexSettings,
    /// Query execution settings.
    pub search: SearchSettings,
    /// Term suggester settings.
    pub suggest: SuggestSettings,
    /// Property name to field kind mapping.
    pub mapping: Mapping,
    /// Directory containing the most specific config file.
    pub config_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration by discovering and merging all relevant `.crix.toml` files.
    ///
    /// Returns `Ok(Config::default())` if no configuration files are found.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let config_files = discover_config_files(cwd);
        Self::load_from_files(&config_files)
    }

    /// Loads configuration from a specific list of config file paths.
    ///
    /// Files should be provided in precedence order: highest precedence first.
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        if files.is_empty() {
            return Ok(Self::default());
        }

        let parsed: Vec<ParsedConfig> = files
            .iter()
            .map(|path| {
                let config = parse_config_file(path)?;
                Ok(ParsedConfig {
                    path: path.clone(),
                    config,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        merge_configs(&parsed)
    }

    /// Returns a configuration rooted at `index_root` with all other settings at defaults.
    ///
    /// Mostly useful for embedding and tests, where no config file exists.
    pub fn with_index_root(index_root: impl Into<PathBuf>) -> Self {
        Self {
            index: IndexSettings {
                root: Some(index_root.into()),
                ..IndexSettings::default()
            },
            ..Self::default()
        }
    }

    /// Returns the directory holding physical indices and the alias file.
    ///
    /// An explicit `index.root` wins; otherwise the index lives in `.crix/index/` next to the
    /// most specific config file. Returns `None` when neither is known.
    pub fn index_root(&self) -> Option<PathBuf> {
        if let Some(root) = &self.index.root {
            return Some(root.clone());
        }
        self.config_root
            .as_ref()
            .map(|dir| dir.join(".crix").join("index"))
    }
}

/// Index location and writer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Alias name; physical indices are named `<name>-<suffix>`.
    pub name: String,
    /// Directory holding the indices, if set explicitly.
    pub root: Option<PathBuf>,
    /// Memory budget of the index writer in bytes.
    pub heap_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            name: String::from("crix"),
            root: None,
            heap_size: 50_000_000,
        }
    }
}

/// Query execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Stemming language for analyzed fields, or `none`.
    pub stemmer: String,
    /// Number of items returned when a query sets no limit.
    pub default_limit: usize,
    /// Upper bound on `offset + fetched items` for a single query.
    pub max_result_window: usize,
    /// Buckets returned per aggregation unless the query asks for a size.
    pub aggregation_size: u32,
    /// Fetch multiplier applied to the limit before access filtering.
    pub overfetch: usize,
    /// Backend call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            stemmer: String::from("none"),
            default_limit: 10,
            max_result_window: 10_000,
            aggregation_size: 1_000,
            overfetch: 2,
            timeout_ms: 5_000,
        }
    }
}

/// Term suggester settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SuggestSettings {
    /// Maximum edit distance between input token and suggestion (1 or 2).
    pub max_edits: u8,
    /// Number of leading characters that must match exactly.
    pub prefix_length: usize,
    /// Tokens shorter than this get no suggestions.
    pub min_word_length: usize,
    /// Maximum options per token.
    pub size: usize,
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self {
            max_edits: 2,
            prefix_length: 1,
            min_word_length: 4,
            size: 5,
        }
    }
}

/// How a content property is represented in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Exact-match string, indexed without analysis.
    Keyword,
    /// Analyzed full text with an exact-match companion for sorting and aggregations.
    Text,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Point in time, second precision.
    Date,
    /// Boolean flag.
    Boolean,
}

impl FieldKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Keyword,
        Self::Text,
        Self::Integer,
        Self::Float,
        Self::Date,
        Self::Boolean,
    ];

    /// Returns the lowercase name used in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }

    /// Returns true for kinds that support range filters.
    pub fn is_range_capable(self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Date)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property name to field kind mapping.
///
/// Properties that are not mapped are not indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mapping {
    /// Mapped properties, ordered by name.
    fields: BTreeMap<String, FieldKind>,
}

impl Mapping {
    /// Creates an empty mapping.
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Adds or replaces the kind of a property.
    pub fn with(mut self, property: impl Into<String>, kind: FieldKind) -> Self {
        self.insert(property, kind);
        self
    }

    /// Adds or replaces the kind of a property.
    pub fn insert(&mut self, property: impl Into<String>, kind: FieldKind) {
        self.fields.insert(property.into(), kind);
    }

    /// Returns the kind of a property, if mapped.
    pub fn kind(&self, property: &str) -> Option<FieldKind> {
        self.fields.get(property).copied()
    }

    /// Iterates mapped properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Returns the names of all `text` properties.
    pub fn text_properties(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, kind)| *kind == FieldKind::Text)
            .map(|(name, _)| name)
    }

    /// Returns the number of mapped properties.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no property is mapped.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for Mapping {
    fn default() -> Self {
        Self::empty().with("title", FieldKind::Text)
    }
}
