//! Archive data model.
//!
//! An archive is the unit of distribution: a header, descriptive metadata,
//! the `content` payload (documents and index data), an optional signature
//! block, and an optional update manifest.
//!
//! The typed model is used for schema validation and for reading header
//! fields. Hashing and signing always operate on the raw `content` value so
//! that fields unknown to this model are still covered by the digest.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FormatError, Result};

/// The only signature algorithm archives may declare.
pub const SIGNATURE_ALGO: &str = "Ed25519";

/// A complete knowledge archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    /// Identity and integrity header (required).
    pub header: Header,
    /// Descriptive metadata (required).
    pub metadata: Metadata,
    /// Document payload (required).
    pub content: Content,
    /// Signature over the content digest, if signed.
    #[serde(
        default,
        deserialize_with = "empty_block_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_block: Option<SignatureBlock>,
    /// Update channel information, passed through untouched.
    #[serde(default)]
    pub update_manifest: serde_json::Map<String, serde_json::Value>,
}

/// Archive header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Unique archive id (a UUID in archives produced by the builder).
    pub id: String,
    /// Archive version (SemVer).
    #[serde(default = "default_version")]
    pub version: String,
    /// Human-readable title.
    pub title: String,
    /// Author of the knowledge base.
    #[serde(default = "default_unknown")]
    pub author: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// SHA-256 of the canonical `content` encoding.
    pub checksum: String,
    /// SPDX license identifier.
    #[serde(default = "default_unknown")]
    pub license: String,
}

/// Descriptive metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Primary content language (BCP 47).
    #[serde(default = "default_language")]
    pub language: String,
    /// Content safety marker.
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    /// Search keywords.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lineage information.
    #[serde(default)]
    pub data_provenance: serde_json::Map<String, serde_json::Value>,
}

/// The hashed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    /// Normalized text chunks.
    pub docs: Vec<String>,
    /// Location of the on-disk vector index, if any.
    #[serde(default)]
    pub vector_index_uri: Option<String>,
    /// Pre-computed full-text or graph index data.
    #[serde(default)]
    pub search_index: Vec<serde_json::Value>,
    /// Source identifiers, one per chunk.
    #[serde(default)]
    pub references: Option<Vec<String>>,
    /// Associated media paths or URIs.
    #[serde(default)]
    pub media: Vec<String>,
}

/// Signature attached to an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Id of the signing publisher.
    pub public_key_id: String,
    /// Signature algorithm identifier.
    #[serde(default = "default_signature_algo")]
    pub signature_algo: String,
    /// The content digest that was signed.
    pub checksum_sha256: String,
    /// Signature bytes, standard base64.
    pub signature_b64: String,
    /// RFC 3339 UTC signing time.
    pub signed_at: String,
}

impl SignatureBlock {
    /// Parse a signature block out of raw archive data.
    ///
    /// Returns `Ok(None)` when the block is absent, `null`, or an empty
    /// object, and an error when it is present but malformed.
    pub fn from_raw(raw: &serde_json::Value) -> Result<Option<Self>> {
        match raw.get("signature_block") {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
            Some(value) => {
                let block: SignatureBlock =
                    serde_json::from_value(value.clone()).map_err(|e| {
                        FormatError::SchemaInvalid {
                            detail: format!("signature_block: {e}"),
                        }
                    })?;
                if block.signature_algo != SIGNATURE_ALGO {
                    return Err(FormatError::SchemaInvalid {
                        detail: format!(
                            "signature_block: unsupported algorithm '{}'",
                            block.signature_algo
                        ),
                    });
                }
                Ok(Some(block))
            }
        }
    }
}

impl Archive {
    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !is_safe_component(&self.header.id) {
            return Err(FormatError::SchemaInvalid {
                detail: format!("header.id '{}' is not a valid package id", self.header.id),
            });
        }
        if self.header.title.trim().is_empty() {
            return Err(FormatError::SchemaInvalid {
                detail: "header.title is required".to_string(),
            });
        }
        semver::Version::parse(&self.header.version).map_err(|e| FormatError::SchemaInvalid {
            detail: format!("header.version '{}': {e}", self.header.version),
        })?;
        Ok(())
    }
}

/// Whether `s` can be used as a single directory name.
///
/// Package ids and publisher ids both become path components in the store
/// and keys directories.
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.starts_with('.')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn empty_block_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<SignatureBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_unknown() -> String {
    "Unknown".to_string()
}

fn default_language() -> String {
    "uk-UA".to_string()
}

fn default_risk_level() -> String {
    "safe".to_string()
}

fn default_signature_algo() -> String {
    SIGNATURE_ALGO.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "header": {
                "id": "test-pkg-v1",
                "title": "Test Package",
                "created_at": "2026-01-01T00:00:00Z",
                "checksum": "fake_checksum"
            },
            "metadata": {},
            "content": { "docs": ["Test content"] }
        })
    }

    #[test]
    fn defaults_applied() {
        let archive: Archive = serde_json::from_value(minimal()).unwrap();
        assert_eq!(archive.header.version, "0.1.0");
        assert_eq!(archive.header.author, "Unknown");
        assert_eq!(archive.header.license, "Unknown");
        assert_eq!(archive.metadata.language, "uk-UA");
        assert_eq!(archive.metadata.risk_level, "safe");
        assert!(archive.signature_block.is_none());
        archive.validate().unwrap();
    }

    #[test]
    fn empty_signature_block_is_absent() {
        let mut raw = minimal();
        raw["signature_block"] = json!({});
        let archive: Archive = serde_json::from_value(raw.clone()).unwrap();
        assert!(archive.signature_block.is_none());
        assert!(SignatureBlock::from_raw(&raw).unwrap().is_none());
    }

    #[test]
    fn malformed_signature_block_rejected() {
        let mut raw = minimal();
        raw["signature_block"] = json!({"public_key_id": "lab-01"});
        assert!(SignatureBlock::from_raw(&raw).is_err());
    }

    #[test]
    fn foreign_algorithm_rejected() {
        let mut raw = minimal();
        raw["signature_block"] = json!({
            "public_key_id": "lab-01",
            "signature_algo": "RSA",
            "checksum_sha256": "00",
            "signature_b64": "AA==",
            "signed_at": "2026-01-01T00:00:00Z"
        });
        let err = SignatureBlock::from_raw(&raw).unwrap_err();
        assert!(err.to_string().contains("unsupported algorithm"));
    }

    #[test]
    fn missing_docs_fails_schema() {
        let mut raw = minimal();
        raw["content"] = json!({"media": []});
        assert!(serde_json::from_value::<Archive>(raw).is_err());
    }

    #[test]
    fn validate_rejects_bad_version_and_id() {
        let mut archive: Archive = serde_json::from_value(minimal()).unwrap();
        archive.header.version = "one".to_string();
        assert!(archive.validate().is_err());

        let mut archive: Archive = serde_json::from_value(minimal()).unwrap();
        archive.header.id = "../escape".to_string();
        assert!(archive.validate().is_err());
    }

    #[test]
    fn safe_components() {
        assert!(is_safe_component("lab-01"));
        assert!(is_safe_component("3f2a9c1e-7b7d-4c1f-9a55-0c2d1e6b8a10"));
        assert!(!is_safe_component(""));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component(".hidden"));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component("a b"));
    }
}
