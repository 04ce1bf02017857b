//! Archive format error types.

use std::path::PathBuf;

/// Errors that can occur while reading, validating, or writing archives.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Archive file does not exist.
    #[error("archive not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file could not be parsed as structured data.
    #[error("cannot parse {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },

    /// Structured data does not match the archive schema.
    #[error("schema validation failed: {detail}")]
    SchemaInvalid { detail: String },

    /// Canonical serialization of a content payload failed.
    #[error("canonical encoding failed: {detail}")]
    Canonical { detail: String },

    /// Durable write failure.
    #[error("write to {} failed: {detail}", path.display())]
    Write { path: PathBuf, detail: String },

    /// Advisory lock failure.
    #[error("cannot lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for archive format operations.
pub type Result<T> = std::result::Result<T, FormatError>;
