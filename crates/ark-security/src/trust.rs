//! Durable registry of known publishers.
//!
//! The registry is a single JSON document (`{version, publishers}`) mapping
//! publisher ids to their public keys and trust flag. Ids are unique: adding
//! a publisher replaces any record with the same id.
//!
//! Each mutation holds an exclusive advisory lock, re-reads the document,
//! applies the change, and writes the result atomically, so concurrent
//! writers from different processes serialize instead of losing updates.
//!
//! A document that cannot be parsed is moved aside and the registry starts
//! empty. This keeps the tool usable, but it drops every trust decision
//! that document held; the recovery is therefore exposed through
//! [`TrustRegistry::recovery`] for callers to report, not just logged.

use std::path::{Path, PathBuf};

use ark_format::{durable, CorruptDocument, FileLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths::SecurityPaths;

/// Version tag written into the registry document.
pub const REGISTRY_VERSION: &str = "0.1";

/// A publisher identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publisher {
    /// Unique, stable publisher id.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Where the public key was imported from.
    pub public_key_path: String,
    /// Whether archives signed by this publisher are accepted.
    #[serde(default = "default_trusted")]
    pub trusted: bool,
    /// Cached PEM of the public key.
    #[serde(default)]
    pub public_key_pem: Option<String>,
    /// When the record was added.
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl Publisher {
    /// A trusted publisher record added now.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        public_key_pem: impl Into<String>,
        public_key_path: impl Into<String>,
    ) -> Self {
        Publisher {
            id: id.into(),
            display_name: display_name.into(),
            public_key_path: public_key_path.into(),
            trusted: true,
            public_key_pem: Some(public_key_pem.into()),
            added_at: Utc::now(),
        }
    }
}

fn default_trusted() -> bool {
    true
}

/// The persisted registry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedPublishers {
    /// Document format version.
    #[serde(default = "default_registry_version")]
    pub version: String,
    /// Publisher records in file order.
    #[serde(default)]
    pub publishers: Vec<Publisher>,
}

impl Default for TrustedPublishers {
    fn default() -> Self {
        TrustedPublishers {
            version: REGISTRY_VERSION.to_string(),
            publishers: Vec::new(),
        }
    }
}

fn default_registry_version() -> String {
    REGISTRY_VERSION.to_string()
}

/// The trust registry backed by `trusted_publishers.json`.
#[derive(Debug)]
pub struct TrustRegistry {
    path: PathBuf,
    data: TrustedPublishers,
    recovery: Option<CorruptDocument>,
}

impl TrustRegistry {
    /// Open the registry under a security root.
    pub fn open(paths: &SecurityPaths) -> Result<Self> {
        Self::open_at(&paths.trust_file())
    }

    /// Open the registry stored at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let (data, recovery) = read_document(path)?;
        Ok(TrustRegistry {
            path: path.to_path_buf(),
            data,
            recovery,
        })
    }

    /// Path of the registry document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set if a corrupt document was moved aside while this registry was
    /// loaded.
    pub fn recovery(&self) -> Option<&CorruptDocument> {
        self.recovery.as_ref()
    }

    /// Insert or replace a publisher by id and persist.
    pub fn add(&mut self, publisher: Publisher) -> Result<()> {
        let id = publisher.id.clone();
        self.mutate(move |doc| {
            doc.publishers.retain(|p| p.id != publisher.id);
            doc.publishers.push(publisher);
            true
        })?;
        tracing::info!(publisher = %id, "publisher added to trust registry");
        Ok(())
    }

    /// Remove a publisher. Returns `true` if a record was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let removed = self.mutate(|doc| {
            let before = doc.publishers.len();
            doc.publishers.retain(|p| p.id != id);
            doc.publishers.len() < before
        })?;
        if removed {
            tracing::info!(publisher = %id, "publisher removed from trust registry");
        }
        Ok(removed)
    }

    /// Look up a publisher by id.
    pub fn get(&self, id: &str) -> Option<&Publisher> {
        self.data.publishers.iter().find(|p| p.id == id)
    }

    /// All publishers in registry file order.
    pub fn list(&self) -> &[Publisher] {
        &self.data.publishers
    }

    /// Run one locked load-mutate-save cycle. `apply` returns whether the
    /// document changed; unchanged documents are not rewritten.
    fn mutate<F>(&mut self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut TrustedPublishers) -> bool,
    {
        let _lock = FileLock::acquire(&self.path)?;
        let (mut doc, recovery) = read_document(&self.path)?;
        if recovery.is_some() {
            self.recovery = recovery;
        }
        let changed = apply(&mut doc);
        if changed {
            let mut bytes = serde_json::to_vec_pretty(&doc)?;
            bytes.push(b'\n');
            durable::write_atomic(&self.path, &bytes)?;
        }
        self.data = doc;
        Ok(changed)
    }
}

fn read_document(path: &Path) -> Result<(TrustedPublishers, Option<CorruptDocument>)> {
    if !path.is_file() {
        return Ok((TrustedPublishers::default(), None));
    }
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<TrustedPublishers>(&text) {
        Ok(doc) => Ok((doc, None)),
        Err(e) => {
            let report = durable::quarantine(path, e.to_string());
            Ok((TrustedPublishers::default(), Some(report)))
        }
    }
}
