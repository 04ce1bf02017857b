//! Store directory layout.
//!
//! ```text
//! <store_root>/
//!   index.json
//!   packages/
//!     <id>/
//!       module.ark | module.yaml
//!       meta.json
//!       <id>.lancedb/        (optional vector index sidecar)
//! ```

use std::path::{Path, PathBuf};

/// Root-relative paths of a package store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Use `root` as the store root, anchoring a relative root to the
    /// current directory. Index entries record paths derived from it and
    /// must resolve from any working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        StorePaths {
            root: std::path::absolute(&root).unwrap_or(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    pub fn package_dir(&self, id: &str) -> PathBuf {
        self.packages_dir().join(id)
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join("index.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let paths = StorePaths::new("/tmp/store");
        assert_eq!(paths.index_file(), PathBuf::from("/tmp/store/index.json"));
        assert_eq!(
            paths.package_dir("kb-1"),
            PathBuf::from("/tmp/store/packages/kb-1")
        );
    }

    #[test]
    fn relative_root_is_anchored() {
        let paths = StorePaths::new("store");
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(paths.root(), cwd.join("store"));
        assert!(paths.package_dir("kb-1").is_absolute());
    }
}
