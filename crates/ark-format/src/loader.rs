//! Reading and writing archive files.
//!
//! Archives are JSON (`.ark`, `.json`) or YAML (`.yaml`, `.yml`).
//! [`read_raw`] returns the parsed document without any schema checks; it is
//! what signing and verification use. [`load`] additionally validates the
//! document against the archive schema.

use std::path::Path;

use crate::archive::Archive;
use crate::digest::{canonical_digest, ContentDigest};
use crate::durable;
use crate::error::{FormatError, Result};

/// On-disk encoding of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl ArchiveFormat {
    /// Determine the format from a file extension. Anything that is not
    /// YAML is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ArchiveFormat::Yaml
            }
            _ => ArchiveFormat::Json,
        }
    }

    /// File name an archive of this format is stored under in a package
    /// directory.
    pub fn module_file_name(&self) -> &'static str {
        match self {
            ArchiveFormat::Json => "module.ark",
            ArchiveFormat::Yaml => "module.yaml",
        }
    }
}

/// Whether the legacy header checksum agrees with the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// `header.checksum` equals the canonical content digest.
    Match,
    /// `header.checksum` differs from the canonical content digest.
    Mismatch {
        /// Value in the header.
        declared: String,
        /// Recomputed digest.
        actual: ContentDigest,
    },
}

/// Read an archive file as raw structured data without validation.
pub fn read_raw(path: &Path) -> Result<serde_json::Value> {
    if !path.is_file() {
        return Err(FormatError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let value = match ArchiveFormat::from_path(path) {
        ArchiveFormat::Json => serde_json::from_str(&text).map_err(|e| FormatError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?,
        ArchiveFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| FormatError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?,
    };
    Ok(value)
}

/// Atomically write raw archive data back in the format implied by `path`.
pub fn write_raw(path: &Path, value: &serde_json::Value) -> Result<()> {
    let bytes = match ArchiveFormat::from_path(path) {
        ArchiveFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(value)?;
            bytes.push(b'\n');
            bytes
        }
        ArchiveFormat::Yaml => serde_yaml::to_string(value)?.into_bytes(),
    };
    durable::write_atomic(path, &bytes)
}

/// The `content` payload of raw archive data (`{}` when absent).
pub fn raw_content(raw: &serde_json::Value) -> serde_json::Value {
    raw.get("content")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
}

/// Load and schema-validate an archive, reporting the header checksum
/// status alongside it.
pub fn load_checked(path: &Path) -> Result<(Archive, ChecksumStatus)> {
    let raw = read_raw(path)?;
    let archive: Archive =
        serde_json::from_value(raw.clone()).map_err(|e| FormatError::SchemaInvalid {
            detail: e.to_string(),
        })?;
    archive.validate()?;

    let actual = canonical_digest(&raw_content(&raw))?;
    let status = if actual.matches(&archive.header.checksum) {
        ChecksumStatus::Match
    } else {
        ChecksumStatus::Mismatch {
            declared: archive.header.checksum.clone(),
            actual,
        }
    };
    Ok((archive, status))
}

/// Load and schema-validate an archive.
///
/// A header checksum that disagrees with the content is logged as a
/// warning; enforcement is the verifier's job.
pub fn load(path: &Path) -> Result<Archive> {
    let (archive, status) = load_checked(path)?;
    if let ChecksumStatus::Mismatch { declared, actual } = &status {
        tracing::warn!(
            path = %path.display(),
            declared = %declared,
            actual = %actual,
            "archive header checksum does not match content"
        );
    }
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(checksum: &str) -> serde_json::Value {
        json!({
            "header": {
                "id": "test-pkg-v1",
                "title": "Test Package",
                "author": "Tester",
                "created_at": "2026-01-01T00:00:00Z",
                "version": "1.0.0",
                "checksum": checksum,
                "license": "MIT"
            },
            "metadata": { "language": "uk", "tags": [] },
            "content": { "docs": ["Test content"], "embeddings": [[0.1, 0.2]], "media": [] }
        })
    }

    fn correct_checksum() -> String {
        canonical_digest(&sample("x")["content"]).unwrap().0
    }

    #[test]
    fn load_json_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.ark");
        std::fs::write(&path, sample(&correct_checksum()).to_string()).unwrap();

        let (archive, status) = load_checked(&path).unwrap();
        assert_eq!(archive.header.id, "test-pkg-v1");
        assert_eq!(archive.content.docs.len(), 1);
        assert_eq!(status, ChecksumStatus::Match);
    }

    #[test]
    fn load_yaml_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.yaml");
        let yaml = serde_yaml::to_string(&sample(&correct_checksum())).unwrap();
        std::fs::write(&path, yaml).unwrap();

        let (archive, status) = load_checked(&path).unwrap();
        assert_eq!(archive.header.title, "Test Package");
        assert_eq!(status, ChecksumStatus::Match);
    }

    #[test]
    fn stale_checksum_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.ark");
        std::fs::write(&path, sample("fake_checksum").to_string()).unwrap();

        let (_, status) = load_checked(&path).unwrap();
        assert!(matches!(status, ChecksumStatus::Mismatch { ref declared, .. } if declared == "fake_checksum"));
        // `load` still succeeds
        load(&path).unwrap();
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_raw(&dir.path().join("nope.ark")).unwrap_err();
        assert!(matches!(err, FormatError::NotFound { .. }));
    }

    #[test]
    fn garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ark");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_raw(&path), Err(FormatError::Parse { .. })));
    }

    #[test]
    fn schema_violation_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noheader.ark");
        std::fs::write(&path, json!({"content": {"docs": []}}).to_string()).unwrap();

        // Raw reading is permissive
        read_raw(&path).unwrap();
        assert!(matches!(load(&path), Err(FormatError::SchemaInvalid { .. })));
    }

    #[test]
    fn write_raw_roundtrips_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["out.ark", "out.yml"] {
            let path = dir.path().join(name);
            let value = sample("abc");
            write_raw(&path, &value).unwrap();
            assert_eq!(read_raw(&path).unwrap(), value);
        }
    }

    #[test]
    fn format_detection() {
        assert_eq!(ArchiveFormat::from_path(Path::new("a.ark")), ArchiveFormat::Json);
        assert_eq!(ArchiveFormat::from_path(Path::new("a.YML")), ArchiveFormat::Yaml);
        assert_eq!(ArchiveFormat::Yaml.module_file_name(), "module.yaml");
    }
}
