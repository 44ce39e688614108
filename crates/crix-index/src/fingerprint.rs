//! Mapping fingerprint computation for index versioning.
//!
//! Each physical index stores a fingerprint of the settings that shape its documents. When
//! the fingerprint of the running configuration differs, the index must be rebuilt before it
//! can be written to or searched.
//!
//! Settings that affect the fingerprint:
//! - Schema version (internal, bumped when system fields change)
//! - Stemmer language
//! - The property mapping

use std::hash::{Hash, Hasher};

use crix_config::{Config, Mapping};
use siphasher::sip::SipHasher24;

/// Current schema version. Bump this when system field definitions change.
pub const SCHEMA_VERSION: u32 = 1;

/// Settings that determine the index layout.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct MappingFingerprint {
    /// Schema version.
    pub schema_version: u32,
    /// Stemmer language for analyzed fields.
    pub stemmer: String,
    /// Property mapping.
    pub mapping: Mapping,
}

impl MappingFingerprint {
    /// Extracts layout-relevant settings from a config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            stemmer: config.search.stemmer.to_lowercase(),
            mapping: config.mapping.clone(),
        }
    }

    /// Hashes the settings.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = SipHasher24::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Hashes the settings into a 16 character hex string.
    pub fn hash_string(&self) -> String {
        format!("{:016x}", self.compute_hash())
    }
}

/// Computes the fingerprint of a config.
pub fn compute_fingerprint(config: &Config) -> String {
    MappingFingerprint::from_config(config).hash_string()
}
