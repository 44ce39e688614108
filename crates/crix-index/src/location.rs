//! Index location resolution.
//!
//! Searches go through an alias: a small file `<root>/<name>.alias` naming the physical index
//! currently serving. Physical indices live in sibling directories named `<name>-<suffix>`,
//! where the suffix is a millisecond timestamp. A rebuild fills a new physical index and then
//! repoints the alias, so readers never see a half-built index.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crix_config::Config;

use crate::IndexError;

/// Extension of the alias file.
const ALIAS_EXTENSION: &str = "alias";
/// File inside a physical index holding its mapping fingerprint.
const FINGERPRINT_FILE: &str = "crix_fingerprint";

/// Where an index lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocation {
    /// Directory holding the alias file and all physical indices.
    root: PathBuf,
    /// Alias name.
    name: String,
}

impl IndexLocation {
    /// Creates a location for alias `name` under `root`.
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// Resolves the location from configuration.
    pub fn from_config(config: &Config) -> Result<Self, IndexError> {
        let root = config.index_root().ok_or(IndexError::NoIndexRoot)?;
        Ok(Self::new(root, config.index.name.clone()))
    }

    /// The directory holding the alias and physical indices.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The alias name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the alias file.
    pub fn alias_path(&self) -> PathBuf {
        self.root.join(format!("{}.{ALIAS_EXTENSION}", self.name))
    }

    /// Directory of a physical index.
    pub fn physical_dir(&self, physical: &str) -> PathBuf {
        self.root.join(physical)
    }

    /// Reads the physical index the alias points at, if the alias exists.
    pub fn read_alias(&self) -> Result<Option<String>, IndexError> {
        match fs::read_to_string(self.alias_path()) {
            Ok(contents) => {
                let physical = contents.trim();
                Ok((!physical.is_empty()).then(|| physical.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Points the alias at a physical index.
    ///
    /// The new target is written to a temporary file and renamed over the alias, so readers
    /// see either the old or the new target.
    pub fn write_alias(&self, physical: &str) -> Result<(), IndexError> {
        fs::create_dir_all(&self.root)?;
        let tmp = self.root.join(format!("{}.{ALIAS_EXTENSION}.tmp", self.name));
        fs::write(&tmp, physical)?;
        fs::rename(&tmp, self.alias_path())?;
        Ok(())
    }

    /// Lists physical indices belonging to this alias, oldest first.
    pub fn physical_indices(&self) -> Result<Vec<String>, IndexError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && self.is_physical_name(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort_by_key(|name| self.suffix(name));
        Ok(names)
    }

    /// Picks an unused physical index name.
    pub fn new_physical_name(&self) -> String {
        let mut suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        loop {
            let name = format!("{}-{suffix}", self.name);
            if !self.physical_dir(&name).exists() {
                return name;
            }
            suffix += 1;
        }
    }

    /// Path of the fingerprint file inside a physical index directory.
    pub fn fingerprint_path(dir: &Path) -> PathBuf {
        dir.join(FINGERPRINT_FILE)
    }

    /// Returns true if `name` is `<alias>-<digits>`.
    fn is_physical_name(&self, name: &str) -> bool {
        self.suffix(name).is_some()
    }

    /// Parses the numeric suffix of a physical index name.
    fn suffix(&self, name: &str) -> Option<u128> {
        let digits = name.strip_prefix(&self.name)?.strip_prefix('-')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}
