//! Crash-safe writes and advisory locking for durable documents.
//!
//! Every document this workspace persists (archives on signing, the trust
//! registry, the store index, package metadata, key files) is written to a
//! temporary file in the destination directory, synced, then renamed over
//! the target, and the directory itself is synced on unix. Readers never
//! observe a partially written file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{FormatError, Result};

/// Atomically replace `target` with `data`.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    write_atomic_with_mode(target, data, None)
}

/// Atomically replace `target` with `data`, restricting the file to owner
/// read/write on unix.
pub fn write_atomic_private(target: &Path, data: &[u8]) -> Result<()> {
    write_atomic_with_mode(target, data, Some(0o600))
}

fn write_atomic_with_mode(target: &Path, data: &[u8], mode: Option<u32>) -> Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if target.is_dir() {
        return Err(FormatError::Write {
            path: target.to_path_buf(),
            detail: "target path is a directory".to_string(),
        });
    }
    std::fs::create_dir_all(parent).map_err(|e| FormatError::Write {
        path: target.to_path_buf(),
        detail: format!("creating parent directory: {e}"),
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| FormatError::Write {
        path: target.to_path_buf(),
        detail: format!("creating temp file: {e}"),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            let perms = std::fs::Permissions::from_mode(mode);
            std::fs::set_permissions(temp.path(), perms).map_err(|e| FormatError::Write {
                path: target.to_path_buf(),
                detail: format!("setting permissions: {e}"),
            })?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    temp.write_all(data).map_err(|e| FormatError::Write {
        path: target.to_path_buf(),
        detail: format!("writing temp file: {e}"),
    })?;
    temp.as_file().sync_all().map_err(|e| FormatError::Write {
        path: target.to_path_buf(),
        detail: format!("syncing temp file: {e}"),
    })?;
    temp.persist(target).map_err(|e| FormatError::Write {
        path: target.to_path_buf(),
        detail: format!("renaming temp file: {}", e.error),
    })?;
    sync_dir(parent).map_err(|e| FormatError::Write {
        path: target.to_path_buf(),
        detail: format!("syncing parent directory: {e}"),
    })?;
    Ok(())
}

/// Flush a directory entry table so a completed rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// An exclusive advisory lock held on a sibling `.lock` file.
///
/// Guards one load-mutate-save cycle of a shared document across
/// processes. The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until an exclusive lock for `document` is held.
    pub fn acquire(document: &Path) -> Result<Self> {
        let path = lock_path(document);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| FormatError::Lock {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| FormatError::Lock {
                path: path.clone(),
                source,
            })?;
        flock_exclusive(&file).map_err(|source| FormatError::Lock {
            path: path.clone(),
            source,
        })?;
        tracing::trace!(path = %path.display(), "acquired document lock");
        Ok(FileLock { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        funlock(&self.file);
    }
}

/// A durable document that failed to parse and was moved aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptDocument {
    /// Path the document was read from.
    pub path: PathBuf,
    /// Where the unreadable bytes were preserved, if the move succeeded.
    pub backup: Option<PathBuf>,
    /// Parser error.
    pub detail: String,
}

impl std::fmt::Display for CorruptDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} was unreadable ({})", self.path.display(), self.detail)?;
        match &self.backup {
            Some(backup) => write!(f, "; preserved as {}", backup.display()),
            None => write!(f, "; backup failed"),
        }
    }
}

/// Move an unparseable document to `<name>.corrupt-<unix-seconds>` so the
/// caller can start from an empty document without destroying the bytes.
pub fn quarantine(path: &Path, detail: impl Into<String>) -> CorruptDocument {
    let detail = detail.into();
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".corrupt-{stamp}"));
    let backup_path = path.with_file_name(name);

    let backup = match std::fs::rename(path, &backup_path) {
        Ok(()) => Some(backup_path),
        Err(e) => {
            tracing::error!(path = %path.display(), err = %e, "failed to preserve corrupt document");
            None
        }
    };
    tracing::warn!(
        path = %path.display(),
        backup = ?backup,
        detail = %detail,
        "corrupt document moved aside; starting empty"
    );
    CorruptDocument {
        path: path.to_path_buf(),
        backup,
        detail,
    }
}

fn lock_path(document: &Path) -> PathBuf {
    let mut name = document
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    document.with_file_name(name)
}

#[cfg(unix)]
fn flock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the
        // duration of the call.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn funlock(file: &File) {
    use std::os::unix::io::AsRawFd;
    // SAFETY: see `flock_exclusive`. Failure leaves the lock to be released
    // when the descriptor closes.
    #[allow(unsafe_code)]
    let _ = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn funlock(_file: &File) {}
