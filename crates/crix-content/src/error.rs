//! Error types for content records and repositories.

use thiserror::Error;

/// Errors raised by the content repository collaborator.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A node path did not have the `/segment/segment` form.
    #[error("invalid node path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },

    /// The repository storage could not be reached.
    #[error("content repository unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A lock guarding in-memory records was poisoned by a panicking writer.
    #[error("content repository lock poisoned")]
    Poisoned,
}
