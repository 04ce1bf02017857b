//! Archive signing.
//!
//! The signed message is the UTF-8 hex string of the canonical content
//! digest, not the content itself. The signature block and the header
//! checksum are replaced together in one atomic rewrite of the archive.

use std::path::{Path, PathBuf};

use ark_format::{canonical_digest, loader, FormatError, SignatureBlock, SIGNATURE_ALGO};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use ed25519_dalek::Signer as _;

use crate::error::{Result, SecurityError};
use crate::keys::KeyManager;

/// Signs archives with locally held publisher keys.
#[derive(Debug, Clone)]
pub struct Signer {
    keys: KeyManager,
}

impl Signer {
    /// Create a signer over a key manager.
    pub fn new(keys: KeyManager) -> Self {
        Signer { keys }
    }

    /// Sign the archive at `archive_path` as `publisher_id`, rewriting the
    /// file in place.
    ///
    /// Nothing is written unless every step before the write succeeds.
    pub fn sign(&self, archive_path: &Path, publisher_id: &str) -> Result<PathBuf> {
        let mut raw = loader::read_raw(archive_path)?;

        let signing_key =
            self.keys
                .get_private_key(publisher_id)?
                .ok_or_else(|| SecurityError::KeyNotFound {
                    publisher_id: publisher_id.to_string(),
                })?;

        let digest = canonical_digest(&loader::raw_content(&raw))?;
        let signature = signing_key.sign(digest.as_str().as_bytes());

        let block = SignatureBlock {
            public_key_id: publisher_id.to_string(),
            signature_algo: SIGNATURE_ALGO.to_string(),
            checksum_sha256: digest.as_str().to_string(),
            signature_b64: BASE64.encode(signature.to_bytes()),
            signed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        let block_value = serde_json::to_value(&block)?;

        let root = raw.as_object_mut().ok_or_else(|| schema_error("archive is not a mapping"))?;
        let header = root
            .get_mut("header")
            .and_then(|h| h.as_object_mut())
            .ok_or_else(|| schema_error("archive has no header mapping"))?;
        header.insert(
            "checksum".to_string(),
            serde_json::Value::String(digest.as_str().to_string()),
        );
        root.insert("signature_block".to_string(), block_value);

        loader::write_raw(archive_path, &raw)?;
        tracing::info!(
            path = %archive_path.display(),
            publisher = %publisher_id,
            checksum = %digest,
            "archive signed"
        );
        Ok(archive_path.to_path_buf())
    }
}

fn schema_error(detail: &str) -> SecurityError {
    SecurityError::Format(FormatError::SchemaInvalid {
        detail: detail.to_string(),
    })
}
