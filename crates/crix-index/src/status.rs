//! Index status detection.
//!
//! Determines the state of the aliased physical index relative to configuration and provides
//! functions for reading and writing the stored fingerprint.

use std::{fs, io, path::Path};

use crix_config::Config;

use crate::{IndexError, fingerprint::compute_fingerprint, location::IndexLocation};

/// Status of the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// The alias points at an index built with the current mapping.
    Current,
    /// The aliased index was built with a different mapping or stemmer.
    MappingChanged,
    /// No alias or no physical index exists.
    Missing,
}

impl IndexStatus {
    /// Returns a human-readable description for display.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::MappingChanged => "stale (mapping changed)",
            Self::Missing => "missing",
        }
    }

    /// Returns true if the index must be rebuilt before use.
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, Self::Current)
    }
}

/// Reads the stored fingerprint of a physical index directory.
///
/// Returns `None` if the fingerprint file doesn't exist or can't be read.
pub fn read_stored_fingerprint(index_dir: &Path) -> Option<String> {
    fs::read_to_string(IndexLocation::fingerprint_path(index_dir))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Writes the fingerprint into a physical index directory.
pub fn write_fingerprint(index_dir: &Path, fingerprint: &str) -> io::Result<()> {
    fs::create_dir_all(index_dir)?;
    fs::write(IndexLocation::fingerprint_path(index_dir), fingerprint)
}

/// Determines the status of the index at `location` for `config`.
///
/// This checks, in order, that the alias exists, that its physical index directory holds a
/// Tantivy index (`meta.json`), and that the stored fingerprint matches the config.
pub fn detect_index_status(
    location: &IndexLocation,
    config: &Config,
) -> Result<IndexStatus, IndexError> {
    status_for_fingerprint(location, &compute_fingerprint(config))
}

/// Determines the status of the index at `location` against a known fingerprint.
pub fn status_for_fingerprint(
    location: &IndexLocation,
    fingerprint: &str,
) -> Result<IndexStatus, IndexError> {
    let Some(physical) = location.read_alias()? else {
        return Ok(IndexStatus::Missing);
    };

    let index_dir = location.physical_dir(&physical);
    if !index_dir.join("meta.json").exists() {
        return Ok(IndexStatus::Missing);
    }

    Ok(match read_stored_fingerprint(&index_dir) {
        Some(stored) if stored == fingerprint => IndexStatus::Current,
        // A missing fingerprint means the index was never finished
        _ => IndexStatus::MappingChanged,
    })
}
