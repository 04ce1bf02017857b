//! The store index: one entry per installed package.
//!
//! `index.json` is the ledger consulted by `list` and `info`. It follows
//! the same durability rules as the trust registry: locked
//! read-modify-write, atomic replacement, and quarantine of unparseable
//! documents with the recovery exposed to callers.
//!
//! [`IndexManager::doctor`] only prunes entries whose stored archive is
//! gone. Packages present on disk but missing from the index are not
//! re-registered; reinstalling them is the way back.

use std::path::{Path, PathBuf};

use ark_format::{durable, CorruptDocument, FileLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::StorePaths;

/// Version tag written into the index document.
pub const INDEX_VERSION: &str = "0.1";

/// Publisher id recorded for archives without a readable signature block.
pub const UNSIGNED_PUBLISHER: &str = "unsigned";

/// A single installed package as recorded in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub version: String,
    pub title: String,
    pub installed_at: DateTime<Utc>,
    /// Stored archive file inside the package directory.
    pub path: PathBuf,
    /// Signature verified at install time.
    pub signature_ok: bool,
    pub publisher_id: String,
    /// Publisher was trusted at install time.
    pub trusted: bool,
    /// Set by `check` when the stored copy no longer matches its meta.
    #[serde(default)]
    pub is_corrupted: bool,
}

/// The persisted index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreIndex {
    #[serde(default = "default_index_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub packages: Vec<IndexEntry>,
}

impl Default for StoreIndex {
    fn default() -> Self {
        StoreIndex {
            version: INDEX_VERSION.to_string(),
            updated_at: Utc::now(),
            packages: Vec::new(),
        }
    }
}

fn default_index_version() -> String {
    INDEX_VERSION.to_string()
}

/// Result of an index repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorReport {
    /// Number of entries dropped.
    pub fixed: usize,
    /// Ids of the dropped entries.
    pub removed: Vec<String>,
}

/// The store index backed by `index.json`.
#[derive(Debug)]
pub struct IndexManager {
    path: PathBuf,
    data: StoreIndex,
    recovery: Option<CorruptDocument>,
}

impl IndexManager {
    /// Open the index of a store.
    pub fn open(paths: &StorePaths) -> Result<Self> {
        Self::open_at(&paths.index_file())
    }

    /// Open the index stored at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let (data, recovery) = read_document(path)?;
        Ok(IndexManager {
            path: path.to_path_buf(),
            data,
            recovery,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set if a corrupt index was moved aside while loading.
    pub fn recovery(&self) -> Option<&CorruptDocument> {
        self.recovery.as_ref()
    }

    /// Insert or replace an entry by id and persist.
    pub fn add(&mut self, entry: IndexEntry) -> Result<()> {
        self.mutate(move |doc| {
            doc.packages.retain(|e| e.id != entry.id);
            doc.packages.push(entry);
            true
        })?;
        Ok(())
    }

    /// Remove an entry. Returns `true` if one was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        self.mutate(|doc| {
            let before = doc.packages.len();
            doc.packages.retain(|e| e.id != id);
            doc.packages.len() < before
        })
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.data.packages.iter().find(|e| e.id == id)
    }

    /// All entries in index order.
    pub fn list(&self) -> &[IndexEntry] {
        &self.data.packages
    }

    /// Record the integrity state of an installed package. Returns `false`
    /// if the id is not indexed.
    pub fn set_corrupted(&mut self, id: &str, corrupted: bool) -> Result<bool> {
        let mut found = false;
        self.mutate(|doc| {
            match doc.packages.iter_mut().find(|e| e.id == id) {
                Some(entry) => {
                    found = true;
                    let changed = entry.is_corrupted != corrupted;
                    entry.is_corrupted = corrupted;
                    changed
                }
                None => false,
            }
        })?;
        Ok(found)
    }

    /// Drop entries whose stored archive no longer exists.
    pub fn doctor(&mut self) -> Result<DoctorReport> {
        let mut report = DoctorReport::default();
        self.mutate(|doc| {
            doc.packages.retain(|e| {
                let present = e.path.is_file();
                if !present {
                    report.removed.push(e.id.clone());
                }
                present
            });
            !report.removed.is_empty()
        })?;
        report.fixed = report.removed.len();
        for id in &report.removed {
            tracing::warn!(package = %id, "dropped index entry with missing archive");
        }
        Ok(report)
    }

    fn mutate<F>(&mut self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut StoreIndex) -> bool,
    {
        let _lock = FileLock::acquire(&self.path)?;
        let (mut doc, recovery) = read_document(&self.path)?;
        if recovery.is_some() {
            self.recovery = recovery;
        }
        let changed = apply(&mut doc);
        if changed {
            doc.updated_at = Utc::now();
            let mut bytes = serde_json::to_vec_pretty(&doc)?;
            bytes.push(b'\n');
            durable::write_atomic(&self.path, &bytes)?;
        }
        self.data = doc;
        Ok(changed)
    }
}

fn read_document(path: &Path) -> Result<(StoreIndex, Option<CorruptDocument>)> {
    if !path.is_file() {
        return Ok((StoreIndex::default(), None));
    }
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<StoreIndex>(&text) {
        Ok(doc) => Ok((doc, None)),
        Err(e) => Ok((StoreIndex::default(), Some(durable::quarantine(path, e.to_string())))),
    }
}
