//! Archive signature verification.
//!
//! Verification is an ordered series of checks, each of which can stop the
//! evaluation with its own reason:
//!
//! 1. the file parses as structured data;
//! 2. a well-formed signature block is present;
//! 3. a public key for the signing publisher can be resolved and is trusted;
//! 4. the recomputed content digest equals the signed checksum;
//! 5. the Ed25519 signature over that checksum verifies.
//!
//! Step 4 runs before step 5 so that edited content with an intact old
//! signature is reported as altered rather than as a bad signature.
//! Callers get the full [`VerifyOutcome`], not a boolean, because every
//! failure calls for a different remedy.

use std::path::Path;

use ark_format::{canonical_digest, loader, SignatureBlock};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::Signature;

use crate::error::ErrorKind;
use crate::keys::KeyManager;

/// Why verification ended where it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyReason {
    /// The archive could not be read or parsed.
    ReadError(String),
    /// No signature block.
    SignatureMissing,
    /// A signature block is present but malformed.
    SignatureBlockInvalid(String),
    /// No public key for the publisher in the registry or keys directory.
    KeyNotFound,
    /// The registry knows the publisher but marks it untrusted.
    PublisherNotTrusted,
    /// Content digest differs from the signed checksum.
    ChecksumMismatch,
    /// Signature does not verify against the publisher key.
    SignatureInvalid,
    /// Everything checked out.
    SignatureValid,
}

impl VerifyReason {
    /// Map onto the shared error taxonomy. `None` for success.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            VerifyReason::ReadError(_) => Some(ErrorKind::NotFound),
            VerifyReason::SignatureMissing
            | VerifyReason::KeyNotFound
            | VerifyReason::PublisherNotTrusted => Some(ErrorKind::UntrustedPublisher),
            VerifyReason::SignatureBlockInvalid(_) => Some(ErrorKind::SchemaInvalid),
            VerifyReason::ChecksumMismatch => Some(ErrorKind::ChecksumMismatch),
            VerifyReason::SignatureInvalid => Some(ErrorKind::SignatureInvalid),
            VerifyReason::SignatureValid => None,
        }
    }
}

impl std::fmt::Display for VerifyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyReason::ReadError(detail) => write!(f, "read error: {detail}"),
            VerifyReason::SignatureMissing => f.write_str("signature block missing"),
            VerifyReason::SignatureBlockInvalid(detail) => {
                write!(f, "signature block invalid: {detail}")
            }
            VerifyReason::KeyNotFound => f.write_str("publisher key not found"),
            VerifyReason::PublisherNotTrusted => f.write_str("publisher not trusted"),
            VerifyReason::ChecksumMismatch => f.write_str("checksum mismatch (content altered)"),
            VerifyReason::SignatureInvalid => f.write_str("cryptographic signature invalid"),
            VerifyReason::SignatureValid => f.write_str("signature valid"),
        }
    }
}

/// The four-part verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// All checks passed.
    pub passed: bool,
    /// Publisher named by the signature block, when one could be read.
    pub publisher_id: Option<String>,
    /// A trusted public key for the publisher was found.
    pub is_trusted: bool,
    /// Where and why evaluation stopped.
    pub reason: VerifyReason,
}

impl VerifyOutcome {
    fn fail(publisher_id: Option<&str>, is_trusted: bool, reason: VerifyReason) -> Self {
        VerifyOutcome {
            passed: false,
            publisher_id: publisher_id.map(str::to_string),
            is_trusted,
            reason,
        }
    }
}

/// Verifies archive signatures against the trust registry.
#[derive(Debug, Clone)]
pub struct Verifier {
    keys: KeyManager,
}

impl Verifier {
    /// Create a verifier resolving keys through `keys`.
    pub fn new(keys: KeyManager) -> Self {
        Verifier { keys }
    }

    /// Verify the archive at `archive_path`.
    pub fn verify(&self, archive_path: &Path) -> VerifyOutcome {
        let raw = match loader::read_raw(archive_path) {
            Ok(raw) => raw,
            Err(e) => return VerifyOutcome::fail(None, false, VerifyReason::ReadError(e.to_string())),
        };

        let block = match SignatureBlock::from_raw(&raw) {
            Ok(Some(block)) => block,
            Ok(None) => return VerifyOutcome::fail(None, false, VerifyReason::SignatureMissing),
            Err(e) => {
                return VerifyOutcome::fail(
                    None,
                    false,
                    VerifyReason::SignatureBlockInvalid(e.to_string()),
                )
            }
        };
        let publisher_id = block.public_key_id.as_str();

        let resolved = match self.keys.resolve_public_key(publisher_id) {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                return VerifyOutcome::fail(Some(publisher_id), false, VerifyReason::KeyNotFound)
            }
            Err(e) => {
                tracing::error!(publisher = %publisher_id, err = %e, "public key lookup failed");
                return VerifyOutcome::fail(Some(publisher_id), false, VerifyReason::KeyNotFound);
            }
        };
        if !resolved.trusted {
            return VerifyOutcome::fail(
                Some(publisher_id),
                false,
                VerifyReason::PublisherNotTrusted,
            );
        }

        let actual = match canonical_digest(&loader::raw_content(&raw)) {
            Ok(digest) => digest,
            Err(e) => {
                return VerifyOutcome::fail(
                    Some(publisher_id),
                    true,
                    VerifyReason::ReadError(e.to_string()),
                )
            }
        };
        if !actual.matches(&block.checksum_sha256) {
            tracing::warn!(
                path = %archive_path.display(),
                publisher = %publisher_id,
                signed = %block.checksum_sha256,
                actual = %actual,
                "content digest differs from signed checksum"
            );
            return VerifyOutcome::fail(Some(publisher_id), true, VerifyReason::ChecksumMismatch);
        }

        let signature = BASE64
            .decode(block.signature_b64.as_bytes())
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok());
        let verified = signature.is_some_and(|sig| {
            resolved
                .key
                .verify_strict(block.checksum_sha256.as_bytes(), &sig)
                .is_ok()
        });
        if !verified {
            return VerifyOutcome::fail(Some(publisher_id), true, VerifyReason::SignatureInvalid);
        }

        tracing::debug!(path = %archive_path.display(), publisher = %publisher_id, "signature valid");
        VerifyOutcome {
            passed: true,
            publisher_id: Some(publisher_id.to_string()),
            is_trusted: true,
            reason: VerifyReason::SignatureValid,
        }
    }
}
