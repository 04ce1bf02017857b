//! Security error types.

use std::path::PathBuf;

use ark_format::FormatError;

/// Errors that can occur during key, trust, and signing operations.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// Publisher id cannot be used as a key directory name.
    #[error("invalid publisher id: '{id}'")]
    InvalidPublisherId { id: String },

    /// Key material could not be created or written.
    #[error("key generation failed for '{publisher_id}': {detail}")]
    KeyGeneration { publisher_id: String, detail: String },

    /// A keypair already exists and replacing it was not requested.
    #[error("a keypair for '{publisher_id}' already exists; replacing it discards the signing identity")]
    KeyExists { publisher_id: String },

    /// No private key exists for the publisher on this machine.
    #[error("private key for '{publisher_id}' not found in keys directory")]
    KeyNotFound { publisher_id: String },

    /// A key file exists but is not a valid Ed25519 PEM key.
    #[error("invalid key at {}: {detail}", path.display())]
    InvalidKey { path: PathBuf, detail: String },

    /// Archive read/validation/write failure.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecurityError {
    /// Classify this error in the shared taxonomy.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SecurityError::KeyNotFound { .. } => Some(ErrorKind::NotFound),
            SecurityError::Format(FormatError::NotFound { .. }) => Some(ErrorKind::NotFound),
            SecurityError::Format(FormatError::SchemaInvalid { .. })
            | SecurityError::Format(FormatError::Parse { .. }) => Some(ErrorKind::SchemaInvalid),
            _ => None,
        }
    }
}

/// Failure categories shared by verification, installation, and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File, publisher, or key absent.
    NotFound,
    /// Archive fails structural validation.
    SchemaInvalid,
    /// Content altered after signing.
    ChecksumMismatch,
    /// Policy rejection: unsigned or unknown publisher.
    UntrustedPublisher,
    /// Cryptographic failure.
    SignatureInvalid,
    /// Durable document unreadable; reset to empty.
    RegistryCorrupt,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::SchemaInvalid => "schema invalid",
            ErrorKind::ChecksumMismatch => "checksum mismatch",
            ErrorKind::UntrustedPublisher => "untrusted publisher",
            ErrorKind::SignatureInvalid => "signature invalid",
            ErrorKind::RegistryCorrupt => "registry corrupt",
        };
        f.write_str(s)
    }
}

/// Result type alias for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;
