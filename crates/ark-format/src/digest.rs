//! Canonical content digests.
//!
//! The archive `content` payload is hashed over its RFC 8785 canonical JSON
//! encoding: object keys sorted, no insignificant whitespace, UTF-8, array
//! order preserved. Two in-memory values that differ only in key insertion
//! order always produce the same digest.
//!
//! Signing, verification and loading all go through [`canonical_digest`];
//! there is no second implementation.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FormatError, Result};

/// A SHA-256 digest in lowercase hex (64 chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(pub String);

impl ContentDigest {
    /// Hash raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Hash a whole file, streaming it in blocks.
    ///
    /// This protects a stored copy against on-disk corruption and is
    /// unrelated to the canonical content digest.
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(ContentDigest(hex::encode(hasher.finalize())))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a hex string as stored in an archive or record.
    pub fn matches(&self, hex: &str) -> bool {
        self.0 == hex
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode a value with the canonical JSON scheme.
pub fn canonical_bytes(content: &serde_json::Value) -> Result<Vec<u8>> {
    serde_jcs::to_vec(content).map_err(|e| FormatError::Canonical {
        detail: e.to_string(),
    })
}

/// Compute the canonical digest of an archive `content` payload.
pub fn canonical_digest(content: &serde_json::Value) -> Result<ContentDigest> {
    Ok(ContentDigest::of_bytes(&canonical_bytes(content)?))
}
