//! Store error types.

use std::path::PathBuf;

use ark_format::FormatError;
use ark_security::{ErrorKind, SecurityError, VerifyReason};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Package or source file absent.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Remote sources are recognized but not fetched.
    #[error("remote install is not supported: {url}")]
    RemoteUnsupported { url: String },

    /// The archive carries a signature from a known publisher that fails
    /// integrity or cryptographic checks. Never overridable.
    #[error("signature rejected: {reason}")]
    SignatureRejected { reason: VerifyReason },

    /// Unsigned archive or unknown publisher without an explicit override.
    #[error("unsigned or untrusted publisher; override required ({reason})")]
    UntrustedPublisher {
        publisher_id: Option<String>,
        reason: VerifyReason,
    },

    /// Package id cannot be used as a directory name in the store.
    #[error("invalid package id: '{id}'")]
    InvalidPackageId { id: String },

    /// Filesystem failure while staging or replacing a package.
    #[error("store error at {}: {detail}", path.display())]
    Storage { path: PathBuf, detail: String },

    /// Archive read/validation failure.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Key or trust registry failure.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Classify this error in the shared taxonomy.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            StoreError::NotFound { .. } => Some(ErrorKind::NotFound),
            StoreError::SignatureRejected { reason } => reason.kind(),
            StoreError::UntrustedPublisher { .. } => Some(ErrorKind::UntrustedPublisher),
            StoreError::InvalidPackageId { .. } => Some(ErrorKind::SchemaInvalid),
            StoreError::Format(FormatError::NotFound { .. }) => Some(ErrorKind::NotFound),
            StoreError::Format(FormatError::SchemaInvalid { .. })
            | StoreError::Format(FormatError::Parse { .. }) => Some(ErrorKind::SchemaInvalid),
            StoreError::Security(e) => e.kind(),
            _ => None,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
