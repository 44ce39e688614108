//! Content model for crix.
//!
//! This crate defines the records that get indexed and the collaborator trait that supplies
//! them:
//! - [`ContentRecord`]: one node variant with typed properties
//! - [`Dimensions`]: the variant axis (e.g. language) of a record
//! - [`NodePath`]: the record's position in the content tree
//! - [`ContentRepository`]: lookup and enumeration, with [`MemoryRepository`] for embedding
//!   and tests

#![warn(missing_docs)]

mod dimensions;
mod error;
mod path;
mod record;
mod repository;
mod value;

pub use dimensions::{Dimensions, LANGUAGE};
pub use error::RepositoryError;
pub use path::NodePath;
pub use record::{ContentRecord, DEFAULT_WORKSPACE, RecordKey};
pub use repository::{ContentRepository, MemoryRepository};
pub use value::PropertyValue;
