//! Configuration merging.
//!
//! Merges multiple `RawConfig` files into a single resolved `Config`, applying precedence
//! rules, resolving paths and validating values.

use std::path::{Path, PathBuf};

use crate::{
    Config, ConfigError, FieldKind, IndexSettings, Mapping, SearchSettings, SuggestSettings,
    parse::{RawConfig, RawIndexSettings, RawMapping, RawSearchSettings, RawSuggestSettings},
    resolve::resolve_index_root,
};

/// Smallest writer memory budget the index engine accepts.
const MIN_HEAP_SIZE: usize = 15_000_000;

/// A parsed config file with its source path.
pub struct ParsedConfig {
    /// Path to the config file.
    pub path: PathBuf,
    /// Parsed raw configuration.
    pub config: RawConfig,
}

impl ParsedConfig {
    /// Directory containing the config file.
    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// Merges multiple configuration files into a single resolved `Config`.
///
/// Configs are given highest precedence first. Scalar settings take the first defined value.
/// Mapped properties merge by name, the highest-precedence declaration winning. When no file
/// declares any mapping the default mapping (`title = text`) applies.
pub fn merge_configs(configs: &[ParsedConfig]) -> Result<Config, ConfigError> {
    if configs.is_empty() {
        return Ok(Config::default());
    }

    let mut index = IndexSettings::default();
    let mut search = SearchSettings::default();
    let mut suggest = SuggestSettings::default();
    let mut mapping = Mapping::empty();

    // Lowest precedence first so that closer files overwrite.
    for parsed in configs.iter().rev() {
        let raw = &parsed.config;
        if let Some(section) = &raw.index {
            apply_index(&mut index, section, parsed.dir())?;
        }
        if let Some(section) = &raw.search {
            apply_search(&mut search, section);
        }
        if let Some(section) = &raw.suggest {
            apply_suggest(&mut suggest, section);
        }
        if let Some(section) = &raw.mapping {
            apply_mapping(&mut mapping, section, &parsed.path)?;
        }
    }

    if mapping.is_empty() {
        mapping = Mapping::default();
    }

    validate(&index, &search, &suggest)?;

    Ok(Config {
        index,
        search,
        suggest,
        mapping,
        config_root: configs.first().map(|c| c.dir().to_path_buf()),
    })
}

/// Applies a raw index section.
fn apply_index(
    result: &mut IndexSettings,
    raw: &RawIndexSettings,
    config_dir: &Path,
) -> Result<(), ConfigError> {
    if let Some(v) = &raw.name {
        result.name = v.clone();
    }
    if let Some(v) = &raw.root {
        result.root = Some(resolve_index_root(v, config_dir)?);
    }
    if let Some(v) = raw.heap_size {
        result.heap_size = v;
    }
    Ok(())
}

/// Applies a raw search section.
fn apply_search(result: &mut SearchSettings, raw: &RawSearchSettings) {
    if let Some(v) = &raw.stemmer {
        result.stemmer = v.clone();
    }
    if let Some(v) = raw.default_limit {
        result.default_limit = v;
    }
    if let Some(v) = raw.max_result_window {
        result.max_result_window = v;
    }
    if let Some(v) = raw.aggregation_size {
        result.aggregation_size = v;
    }
    if let Some(v) = raw.overfetch {
        result.overfetch = v;
    }
    if let Some(v) = raw.timeout_ms {
        result.timeout_ms = v;
    }
}

/// Applies a raw suggest section.
fn apply_suggest(result: &mut SuggestSettings, raw: &RawSuggestSettings) {
    if let Some(v) = raw.max_edits {
        result.max_edits = v;
    }
    if let Some(v) = raw.prefix_length {
        result.prefix_length = v;
    }
    if let Some(v) = raw.min_word_length {
        result.min_word_length = v;
    }
    if let Some(v) = raw.size {
        result.size = v;
    }
}

/// Applies a raw mapping section from one file.
///
/// Within a single file a property may only appear under one kind.
fn apply_mapping(result: &mut Mapping, raw: &RawMapping, path: &Path) -> Result<(), ConfigError> {
    let mut declared = Mapping::empty();

    for kind in FieldKind::ALL {
        for property in raw.properties(kind) {
            if !is_valid_property_name(property) {
                return Err(ConfigError::InvalidPropertyName {
                    property: property.clone(),
                    path: path.to_path_buf(),
                });
            }
            if let Some(first) = declared.kind(property)
                && first != kind
            {
                return Err(ConfigError::ConflictingMapping {
                    property: property.clone(),
                    first,
                    second: kind,
                    path: path.to_path_buf(),
                });
            }
            declared.insert(property.clone(), kind);
        }
    }

    for (property, kind) in declared.iter() {
        result.insert(property, kind);
    }
    Ok(())
}

/// Property names become index field names: ASCII alphanumerics, `_` and `-` only.
fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Rejects settings that would make the index or queries unusable.
fn validate(
    index: &IndexSettings,
    search: &SearchSettings,
    suggest: &SuggestSettings,
) -> Result<(), ConfigError> {
    if index.name.is_empty() || !is_valid_property_name(&index.name) {
        return Err(ConfigError::InvalidSetting {
            name: "index.name",
            message: format!("'{}' is not a usable index name", index.name),
        });
    }
    if index.heap_size < MIN_HEAP_SIZE {
        return Err(ConfigError::InvalidSetting {
            name: "index.heap_size",
            message: format!("{} is below the minimum of {MIN_HEAP_SIZE} bytes", index.heap_size),
        });
    }
    if search.overfetch == 0 {
        return Err(ConfigError::InvalidSetting {
            name: "search.overfetch",
            message: "must be at least 1".to_string(),
        });
    }
    if search.timeout_ms == 0 {
        return Err(ConfigError::InvalidSetting {
            name: "search.timeout_ms",
            message: "must be at least 1".to_string(),
        });
    }
    if search.aggregation_size == 0 {
        return Err(ConfigError::InvalidSetting {
            name: "search.aggregation_size",
            message: "must be at least 1".to_string(),
        });
    }
    if search.default_limit > search.max_result_window {
        return Err(ConfigError::InvalidSetting {
            name: "search.default_limit",
            message: format!(
                "{} exceeds max_result_window {}",
                search.default_limit, search.max_result_window
            ),
        });
    }
    if !(1..=2).contains(&suggest.max_edits) {
        return Err(ConfigError::InvalidSetting {
            name: "suggest.max_edits",
            message: format!("{} is not 1 or 2", suggest.max_edits),
        });
    }
    Ok(())
}
