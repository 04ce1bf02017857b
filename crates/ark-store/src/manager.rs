//! Store facade used by the CLI.
//!
//! Wraps the installer and the index behind one type that owns the store
//! layout and the verifier. Every store operation the CLI exposes goes
//! through [`StoreManager`].

use std::path::PathBuf;

use ark_format::CorruptDocument;
use ark_security::{KeyManager, Verifier};
use url::Url;

use crate::error::{Result, StoreError};
use crate::index::{DoctorReport, IndexEntry, IndexManager};
use crate::installer::Installer;
use crate::meta::{PackageMeta, META_FILE};
use crate::paths::StorePaths;

/// Where an archive to install comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    /// A file on this machine.
    Local { path: PathBuf },
    /// An `http`/`https` URL. Recognized, not fetched.
    Remote { url: Url },
}

impl ArchiveSource {
    /// Classify a user-supplied source string.
    pub fn parse(source: &str) -> Self {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ArchiveSource::Remote { url },
            _ => ArchiveSource::Local {
                path: PathBuf::from(source),
            },
        }
    }
}

/// Everything known about an installed package.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub entry: IndexEntry,
    /// `None` when `meta.json` is missing or unreadable.
    pub meta: Option<PackageMeta>,
}

/// The local package store.
#[derive(Debug)]
pub struct StoreManager {
    paths: StorePaths,
    installer: Installer,
    index: IndexManager,
}

impl StoreManager {
    /// Open the store at `paths`, verifying installs with keys from `keys`.
    pub fn open(paths: StorePaths, keys: KeyManager) -> Result<Self> {
        let index = IndexManager::open(&paths)?;
        let installer = Installer::new(paths.clone(), Verifier::new(keys));
        Ok(StoreManager {
            paths,
            installer,
            index,
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Set if the index was found corrupt and reset.
    pub fn recovery(&self) -> Option<&CorruptDocument> {
        self.index.recovery()
    }

    pub fn install(&mut self, source: &ArchiveSource, allow_untrusted: bool) -> Result<IndexEntry> {
        match source {
            ArchiveSource::Local { path } => {
                if !path.exists() {
                    return Err(StoreError::NotFound {
                        what: path.display().to_string(),
                    });
                }
                self.installer.install(&mut self.index, path, allow_untrusted)
            }
            ArchiveSource::Remote { url } => Err(StoreError::RemoteUnsupported {
                url: url.to_string(),
            }),
        }
    }

    pub fn list(&self) -> &[IndexEntry] {
        self.index.list()
    }

    /// Index entry plus `meta.json` for an installed package.
    pub fn get_info(&self, id: &str) -> Result<PackageInfo> {
        let entry = self.entry(id)?.clone();
        let meta = entry
            .path
            .parent()
            .map(|dir| dir.join(META_FILE))
            .and_then(|path| match PackageMeta::read(&path) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::debug!(package = %id, err = %e, "meta.json unavailable, using index entry");
                    None
                }
            });
        Ok(PackageInfo { entry, meta })
    }

    /// Delete an installed package and its index entry.
    ///
    /// The package directory is only deleted when it sits directly inside
    /// the store's packages directory; an entry pointing elsewhere is
    /// dropped from the index without touching the filesystem.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let packages_dir = self.paths.packages_dir();
        match entry.path.parent() {
            Some(dir) if dir.parent() == Some(packages_dir.as_path()) => {
                if dir.exists() {
                    std::fs::remove_dir_all(dir).map_err(|e| StoreError::Storage {
                        path: dir.to_path_buf(),
                        detail: e.to_string(),
                    })?;
                }
            }
            _ => tracing::warn!(
                package = %id,
                path = %entry.path.display(),
                "package path outside store; leaving files in place"
            ),
        }
        self.index.remove(id)?;
        tracing::info!(package = %id, "package removed");
        Ok(())
    }

    /// Drop index entries whose archive is gone.
    pub fn doctor(&mut self) -> Result<DoctorReport> {
        self.index.doctor()
    }

    /// Re-hash an installed package against its meta and record the result
    /// in the index. Returns `true` when the stored copy is intact.
    pub fn check(&mut self, id: &str) -> Result<bool> {
        let entry = self.entry(id)?.clone();
        let intact = self.installer.check(&entry)?;
        if !intact {
            tracing::warn!(package = %id, path = %entry.path.display(), "stored package is corrupted");
        }
        self.index.set_corrupted(id, !intact)?;
        Ok(intact)
    }

    fn entry(&self, id: &str) -> Result<&IndexEntry> {
        self.index.get(id).ok_or_else(|| StoreError::NotFound {
            what: format!("package '{id}'"),
        })
    }
}
