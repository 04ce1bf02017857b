//! Verified installation of archives into the store.
//!
//! Installation is gated on the verifier's outcome:
//!
//! | passed | trusted | override | result                          |
//! |--------|---------|----------|---------------------------------|
//! | yes    | yes     | any      | install, `signature_ok = true`  |
//! | no     | yes     | any      | reject (`SignatureRejected`)    |
//! | no     | no      | no       | reject (`UntrustedPublisher`)   |
//! | no     | no      | yes      | install with a warning          |
//!
//! A package is assembled in a `.staging-<uuid>` directory next to its
//! final location and then renamed into place, so a reinstall either fully
//! replaces the previous package or leaves it untouched.

use std::path::Path;

use ark_format::{loader, Archive, ArchiveFormat, ContentDigest};
use ark_security::{VerifyOutcome, Verifier};
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::index::{IndexEntry, IndexManager, UNSIGNED_PUBLISHER};
use crate::meta::{PackageMeta, META_FILE};
use crate::paths::StorePaths;

/// Installs archives into a store.
#[derive(Debug, Clone)]
pub struct Installer {
    paths: StorePaths,
    verifier: Verifier,
}

impl Installer {
    pub fn new(paths: StorePaths, verifier: Verifier) -> Self {
        Installer { paths, verifier }
    }

    /// Verify, validate, and store the archive at `source`, then record it
    /// in `index`.
    ///
    /// The source is copied into staging first. Verification, validation,
    /// and the recorded file hash all read that one copy, so the bytes that
    /// pass the gate are the bytes that get installed.
    pub fn install(
        &self,
        index: &mut IndexManager,
        source: &Path,
        allow_untrusted: bool,
    ) -> Result<IndexEntry> {
        if !source.is_file() {
            return Err(StoreError::NotFound {
                what: source.display().to_string(),
            });
        }
        let module_file = ArchiveFormat::from_path(source).module_file_name();

        let packages_dir = self.paths.packages_dir();
        std::fs::create_dir_all(&packages_dir).map_err(|e| storage(&packages_dir, e))?;
        let staging = packages_dir.join(format!(".staging-{}", Uuid::new_v4()));
        std::fs::create_dir(&staging).map_err(|e| storage(&staging, e))?;

        let (archive, outcome) =
            match self.stage(&staging, source, module_file, allow_untrusted) {
                Ok(staged) => staged,
                Err(e) => {
                    discard(&staging);
                    return Err(e);
                }
            };
        let id = archive.header.id.clone();

        let target = self.paths.package_dir(&id);
        if let Err(e) = replace_dir(&staging, &target, &packages_dir) {
            discard(&staging);
            return Err(e);
        }

        let entry = IndexEntry {
            id: id.clone(),
            version: archive.header.version.clone(),
            title: archive.header.title.clone(),
            installed_at: Utc::now(),
            path: target.join(module_file),
            signature_ok: outcome.passed,
            publisher_id: outcome
                .publisher_id
                .clone()
                .unwrap_or_else(|| UNSIGNED_PUBLISHER.to_string()),
            trusted: outcome.is_trusted,
            is_corrupted: false,
        };
        index.add(entry.clone())?;
        tracing::info!(
            package = %id,
            version = %entry.version,
            publisher = %entry.publisher_id,
            signature_ok = entry.signature_ok,
            "package installed"
        );
        Ok(entry)
    }

    /// Fill `staging` with the archive copy, its vector index, and meta.
    fn stage(
        &self,
        staging: &Path,
        source: &Path,
        module_file: &str,
        allow_untrusted: bool,
    ) -> Result<(Archive, VerifyOutcome)> {
        let stored = staging.join(module_file);
        std::fs::copy(source, &stored).map_err(|e| storage(&stored, e))?;

        let outcome = self.verifier.verify(&stored);
        gate(source, &outcome, allow_untrusted)?;
        let archive = loader::load(&stored)?;

        let sidecar_name = format!("{}.lancedb", archive.header.id);
        let sidecar = source
            .parent()
            .map(|dir| dir.join(&sidecar_name))
            .filter(|p| p.is_dir());
        match sidecar {
            Some(sidecar) => {
                copy_dir(&sidecar, &staging.join(&sidecar_name))?;
                tracing::debug!(from = %sidecar.display(), "vector index copied");
            }
            None => tracing::debug!(package = %archive.header.id, "no vector index next to archive"),
        }

        PackageMeta::describe(&archive, &stored)?.write(&staging.join(META_FILE))?;
        Ok((archive, outcome))
    }

    /// Recompute the stored archive's file hash and compare it with the
    /// checksum recorded in `meta.json`. A missing archive or unreadable
    /// meta counts as a failed check.
    pub fn check(&self, entry: &IndexEntry) -> Result<bool> {
        if !entry.path.is_file() {
            return Ok(false);
        }
        let Some(package_dir) = entry.path.parent() else {
            return Ok(false);
        };
        let meta = match PackageMeta::read(&package_dir.join(META_FILE)) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(package = %entry.id, err = %e, "package meta unreadable");
                return Ok(false);
            }
        };
        Ok(ContentDigest::of_file(&entry.path)?.matches(&meta.checksum))
    }
}

fn gate(source: &Path, outcome: &VerifyOutcome, allow_untrusted: bool) -> Result<()> {
    if outcome.passed {
        return Ok(());
    }
    if outcome.is_trusted {
        return Err(StoreError::SignatureRejected {
            reason: outcome.reason.clone(),
        });
    }
    if !allow_untrusted {
        return Err(StoreError::UntrustedPublisher {
            publisher_id: outcome.publisher_id.clone(),
            reason: outcome.reason.clone(),
        });
    }
    tracing::warn!(
        path = %source.display(),
        publisher = ?outcome.publisher_id,
        reason = %outcome.reason,
        "installing unverified archive on explicit override"
    );
    Ok(())
}

/// Move `staging` to `target`, superseding any existing package.
fn replace_dir(staging: &Path, target: &Path, packages_dir: &Path) -> Result<()> {
    if !target.exists() {
        return std::fs::rename(staging, target).map_err(|e| storage(target, e));
    }

    let trash = packages_dir.join(format!(".trash-{}", Uuid::new_v4()));
    std::fs::rename(target, &trash).map_err(|e| storage(target, e))?;
    if let Err(e) = std::fs::rename(staging, target) {
        if let Err(restore) = std::fs::rename(&trash, target) {
            tracing::error!(
                path = %target.display(),
                trash = %trash.display(),
                err = %restore,
                "failed to restore previous package"
            );
        }
        return Err(storage(target, e));
    }
    if let Err(e) = std::fs::remove_dir_all(&trash) {
        tracing::warn!(path = %trash.display(), err = %e, "could not remove superseded package");
    }
    Ok(())
}

/// Recursively copy a vector index directory. Symbolic links are
/// rejected.
fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| storage(to, e))?;
    let entries = std::fs::read_dir(from).map_err(|e| storage(from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| storage(from, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| storage(&path, e))?;
        let dest = to.join(entry.file_name());
        if file_type.is_symlink() {
            return Err(StoreError::Storage {
                path,
                detail: "symbolic links are not allowed in a vector index".to_string(),
            });
        } else if file_type.is_dir() {
            copy_dir(&path, &dest)?;
        } else {
            std::fs::copy(&path, &dest).map_err(|e| storage(&path, e))?;
        }
    }
    Ok(())
}

fn discard(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging) {
        tracing::warn!(path = %staging.display(), err = %e, "could not remove staging directory");
    }
}

fn storage(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Storage {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_security::{KeyManager, SecurityPaths, Signer, VerifyReason};
    use serde_json::json;
    use std::path::PathBuf;

    struct Env {
        dir: tempfile::TempDir,
        keys: KeyManager,
        paths: StorePaths,
    }

    impl Env {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let keys = KeyManager::new(SecurityPaths::new(dir.path().join("security")));
            let paths = StorePaths::new(dir.path().join("store"));
            Env { dir, keys, paths }
        }

        fn installer(&self) -> Installer {
            Installer::new(self.paths.clone(), Verifier::new(self.keys.clone()))
        }

        fn index(&self) -> IndexManager {
            IndexManager::open(&self.paths).unwrap()
        }

        fn archive(&self, name: &str, title: &str) -> PathBuf {
            let path = self.dir.path().join("src").join(name);
            loader::write_raw(
                &path,
                &json!({
                    "header": {"id": "kb-1", "title": title, "created_at": "2026-01-01", "checksum": ""},
                    "metadata": {},
                    "content": {"docs": ["one", "two"]}
                }),
            )
            .unwrap();
            path
        }

        fn signed(&self, name: &str, title: &str) -> PathBuf {
            let path = self.archive(name, title);
            if self.keys.get_private_key("lab-01").unwrap().is_none() {
                self.keys.generate_keypair("lab-01").unwrap();
                self.keys.trust_local_publisher("lab-01", "Lab").unwrap();
            }
            Signer::new(self.keys.clone()).sign(&path, "lab-01").unwrap();
            path
        }
    }

    fn package_entries(paths: &StorePaths) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(paths.packages_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn trusted_install_lays_out_package() {
        let env = Env::new();
        let source = env.signed("kb.ark", "KB");
        let sidecar = source.parent().unwrap().join("kb-1.lancedb").join("data");
        std::fs::create_dir_all(&sidecar).unwrap();
        std::fs::write(sidecar.join("part-0"), b"vectors").unwrap();

        let mut index = env.index();
        let entry = env.installer().install(&mut index, &source, false).unwrap();

        assert!(entry.signature_ok);
        assert!(entry.trusted);
        assert_eq!(entry.publisher_id, "lab-01");
        let dir = env.paths.package_dir("kb-1");
        assert_eq!(entry.path, dir.join("module.ark"));
        assert!(dir.join(META_FILE).is_file());
        assert_eq!(
            std::fs::read(dir.join("kb-1.lancedb/data/part-0")).unwrap(),
            b"vectors"
        );
        assert_eq!(package_entries(&env.paths), vec!["kb-1"]);
        assert!(env.installer().check(&entry).unwrap());
    }

    #[test]
    fn unsigned_requires_override() {
        let env = Env::new();
        let source = env.archive("kb.ark", "KB");
        let mut index = env.index();

        let err = env.installer().install(&mut index, &source, false).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UntrustedPublisher {
                reason: VerifyReason::SignatureMissing,
                ..
            }
        ));
        assert!(index.list().is_empty());
        assert!(!env.paths.package_dir("kb-1").exists());

        let entry = env.installer().install(&mut index, &source, true).unwrap();
        assert!(!entry.signature_ok);
        assert!(!entry.trusted);
        assert_eq!(entry.publisher_id, UNSIGNED_PUBLISHER);
    }

    #[test]
    fn tampered_signed_archive_is_never_installed() {
        let env = Env::new();
        let source = env.signed("kb.ark", "KB");
        let mut raw = loader::read_raw(&source).unwrap();
        raw["content"]["docs"][1] = json!("tww");
        loader::write_raw(&source, &raw).unwrap();

        let mut index = env.index();
        for allow in [false, true] {
            let err = env.installer().install(&mut index, &source, allow).unwrap_err();
            assert!(matches!(
                err,
                StoreError::SignatureRejected {
                    reason: VerifyReason::ChecksumMismatch
                }
            ));
        }
        assert!(index.list().is_empty());
    }

    #[test]
    fn reinstall_supersedes_previous_package() {
        let env = Env::new();
        let mut index = env.index();
        let first = env.signed("a.ark", "First");
        let old_sidecar = first.parent().unwrap().join("kb-1.lancedb");
        std::fs::create_dir_all(&old_sidecar).unwrap();
        env.installer().install(&mut index, &first, false).unwrap();
        std::fs::remove_dir_all(&old_sidecar).unwrap();

        let second = env.signed("b.ark", "Second");
        env.installer().install(&mut index, &second, false).unwrap();

        assert_eq!(index.list().len(), 1);
        assert_eq!(index.get("kb-1").unwrap().title, "Second");
        let dir = env.paths.package_dir("kb-1");
        assert!(!dir.join("kb-1.lancedb").exists());
        assert_eq!(PackageMeta::read(&dir.join(META_FILE)).unwrap().title, "Second");
        assert_eq!(package_entries(&env.paths), vec!["kb-1"]);
    }

    #[test]
    fn yaml_archive_stored_as_yaml() {
        let env = Env::new();
        let source = env.signed("kb.yaml", "KB");
        let mut index = env.index();

        let entry = env.installer().install(&mut index, &source, false).unwrap();
        assert_eq!(entry.path.file_name().unwrap(), "module.yaml");
        assert!(entry.signature_ok);
    }

    #[test]
    fn invalid_archive_leaves_no_staging() {
        let env = Env::new();
        let source = env.dir.path().join("bad.ark");
        std::fs::write(&source, r#"{"header": {"id": "x"}}"#).unwrap();
        let mut index = env.index();

        let err = env.installer().install(&mut index, &source, true).unwrap_err();
        assert!(matches!(err, StoreError::Format(_)));
        assert!(!env.paths.packages_dir().exists() || package_entries(&env.paths).is_empty());
    }

    #[test]
    fn missing_source() {
        let env = Env::new();
        let mut index = env.index();
        let err = env
            .installer()
            .install(&mut index, &env.dir.path().join("nope.ark"), true)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn check_detects_modified_copy() {
        let env = Env::new();
        let source = env.signed("kb.ark", "KB");
        let mut index = env.index();
        let entry = env.installer().install(&mut index, &source, false).unwrap();

        std::fs::write(&entry.path, b"{}").unwrap();
        assert!(!env.installer().check(&entry).unwrap());
        std::fs::remove_file(&entry.path).unwrap();
        assert!(!env.installer().check(&entry).unwrap());
    }

    #[test]
    fn recorded_signature_state_matches_stored_copy() {
        let env = Env::new();
        let verifier = Verifier::new(env.keys.clone());
        let mut index = env.index();

        let signed = env.signed("kb.ark", "KB");
        let entry = env.installer().install(&mut index, &signed, false).unwrap();
        // Later edits to the source do not reach the installed package.
        std::fs::write(&signed, b"{}").unwrap();
        assert!(entry.signature_ok);
        assert_eq!(verifier.verify(&entry.path).passed, entry.signature_ok);
        assert!(env.installer().check(&entry).unwrap());

        let unsigned = env.archive("other.ark", "Unsigned");
        let entry = env.installer().install(&mut index, &unsigned, true).unwrap();
        assert!(!entry.signature_ok);
        assert_eq!(verifier.verify(&entry.path).passed, entry.signature_ok);
    }

    #[test]
    fn rejected_install_leaves_no_staging() {
        let env = Env::new();
        let source = env.archive("kb.ark", "KB");
        let mut index = env.index();

        env.installer().install(&mut index, &source, false).unwrap_err();
        assert!(package_entries(&env.paths).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_in_vector_index_is_rejected() {
        let env = Env::new();
        let source = env.signed("kb.ark", "KB");
        let sidecar = source.parent().unwrap().join("kb-1.lancedb");
        std::fs::create_dir_all(&sidecar).unwrap();
        let outside = env.dir.path().join("outside.bin");
        std::fs::write(&outside, b"elsewhere").unwrap();
        std::os::unix::fs::symlink(&outside, sidecar.join("part-0")).unwrap();

        let mut index = env.index();
        let err = env.installer().install(&mut index, &source, false).unwrap_err();
        match err {
            StoreError::Storage { path, .. } => assert_eq!(path, sidecar.join("part-0")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(index.list().is_empty());
        assert!(package_entries(&env.paths).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_in_vector_index_is_rejected() {
        let env = Env::new();
        let source = env.signed("kb.ark", "KB");
        let sidecar = source.parent().unwrap().join("kb-1.lancedb");
        std::fs::create_dir_all(&sidecar).unwrap();
        let outside = env.dir.path().join("outside-dir");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("data"), b"vectors").unwrap();
        std::os::unix::fs::symlink(&outside, sidecar.join("linked")).unwrap();

        let mut index = env.index();
        let err = env.installer().install(&mut index, &source, false).unwrap_err();
        match err {
            StoreError::Storage { path, detail } => {
                assert_eq!(path, sidecar.join("linked"));
                assert!(detail.contains("symbolic links"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!env.paths.package_dir("kb-1").exists());
    }
}
