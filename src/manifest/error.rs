use std::path::PathBuf;
use thiserror::Error;

use super::schema::HttpMethod;

/// Errors raised while parsing, validating or aggregating manifests
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid manifest slug '{0}': expected lowercase letters, digits and '-'")]
    InvalidSlug(String),

    #[error("Manifest '{slug}' is missing required field '{field}'")]
    MissingField { slug: String, field: &'static str },

    #[error("Manifest '{slug}' route {method} {path}: {reason}")]
    InvalidRoute {
        slug: String,
        path: String,
        method: HttpMethod,
        reason: String,
    },

    #[error("Manifest '{slug}' declares {method} {path} more than once")]
    DuplicateRoute {
        slug: String,
        path: String,
        method: HttpMethod,
    },

    #[error("Manifest slug '{0}' is already registered")]
    DuplicateSlug(String),

    #[error("Unknown HTTP method '{0}'")]
    UnknownMethod(String),

    #[error("Failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Unsupported manifest format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}
