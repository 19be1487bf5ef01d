//! Error types for the storage and repository layers.
//!
//! A missing artifact is not represented here as far as the template service
//! is concerned: [`crate::template::TemplateResult`] turns it into data.

use thiserror::Error;

use crate::models::{Category, InvalidCategory};

/// Errors reported by a [`crate::blob::BlobStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The remote path does not exist.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// A write without overwrite hit an existing path.
    #[error("blob already exists: {0}")]
    AlreadyExists(String),

    /// Connectivity or authorization failure. Never carries credentials.
    #[error("blob backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// The local constraint an artifact write violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    #[error("unsupported format '{extension}' (allowed: sql, md, txt, json, py, yaml, csv, xml)")]
    Format { extension: String },

    #[error("size {size_bytes} bytes exceeds the {max_bytes} byte limit")]
    Size { size_bytes: u64, max_bytes: u64 },

    #[error("invalid artifact name '{0}'")]
    Name(String),

    #[error("content of {0} is not valid UTF-8")]
    Encoding(String),
}

/// Errors reported by the [`crate::repository::ArtifactRepository`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("artifact not found: {category}/{name}")]
    ArtifactNotFound { category: Category, name: String },

    #[error("invalid artifact: {0}")]
    InvalidArtifact(Constraint),

    #[error("artifact already exists: {0}")]
    AlreadyExists(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl From<InvalidCategory> for RepositoryError {
    fn from(err: InvalidCategory) -> Self {
        RepositoryError::UnknownCategory(err.0)
    }
}

impl From<Constraint> for RepositoryError {
    fn from(c: Constraint) -> Self {
        RepositoryError::InvalidArtifact(c)
    }
}
