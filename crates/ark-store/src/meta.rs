//! Per-package `meta.json`.

use std::path::Path;

use ark_format::{durable, Archive, ContentDigest};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the metadata record inside a package directory.
pub const META_FILE: &str = "meta.json";

/// Descriptive and integrity information about a stored package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMeta {
    pub id: String,
    pub title: String,
    pub version: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    pub doc_count: usize,
    /// Documents backed by the vector index; zero without one.
    pub embedding_count: usize,
    /// Size of the stored archive file.
    pub total_size_bytes: u64,
    /// SHA-256 of the stored archive file bytes.
    pub checksum: String,
}

impl PackageMeta {
    /// Describe `archive` as stored at `stored_file`.
    pub fn describe(archive: &Archive, stored_file: &Path) -> Result<Self> {
        let checksum = ContentDigest::of_file(stored_file)?;
        let total_size_bytes = std::fs::metadata(stored_file)?.len();
        let doc_count = archive.content.docs.len();
        let description = archive
            .metadata
            .data_provenance
            .get("description")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(PackageMeta {
            id: archive.header.id.clone(),
            title: archive.header.title.clone(),
            version: archive.header.version.clone(),
            author: archive.header.author.clone(),
            description,
            created_at: archive.header.created_at.clone(),
            doc_count,
            embedding_count: if archive.content.vector_index_uri.is_some() {
                doc_count
            } else {
                0
            },
            total_size_bytes,
            checksum: checksum.0,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        durable::write_atomic(path, &bytes)?;
        Ok(())
    }
}
