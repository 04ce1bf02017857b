//! Filesystem layout of the security root.
//!
//! ```text
//! <root>/
//!   keys/
//!     <publisher-id>/
//!       private_key.pem
//!       public_key.pem
//!   trusted_publishers.json
//! ```

use std::path::{Path, PathBuf};

/// Location of key material and the trust registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPaths {
    root: PathBuf,
}

impl SecurityPaths {
    /// Use `root` as the security root. A relative root is anchored to the
    /// current directory here, so derived paths stay valid after the
    /// process changes directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        SecurityPaths {
            root: std::path::absolute(&root).unwrap_or(root),
        }
    }

    /// The security root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one subdirectory per publisher.
    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    /// Key directory of one publisher.
    pub fn publisher_dir(&self, publisher_id: &str) -> PathBuf {
        self.keys_dir().join(publisher_id)
    }

    /// PKCS#8 private key of one publisher.
    pub fn private_key_path(&self, publisher_id: &str) -> PathBuf {
        self.publisher_dir(publisher_id).join("private_key.pem")
    }

    /// SubjectPublicKeyInfo public key of one publisher.
    pub fn public_key_path(&self, publisher_id: &str) -> PathBuf {
        self.publisher_dir(publisher_id).join("public_key.pem")
    }

    /// Trust registry document.
    pub fn trust_file(&self) -> PathBuf {
        self.root.join("trusted_publishers.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let paths = SecurityPaths::new("/sec");
        assert_eq!(paths.keys_dir(), Path::new("/sec/keys"));
        assert_eq!(
            paths.private_key_path("lab-01"),
            Path::new("/sec/keys/lab-01/private_key.pem")
        );
        assert_eq!(
            paths.public_key_path("lab-01"),
            Path::new("/sec/keys/lab-01/public_key.pem")
        );
        assert_eq!(paths.trust_file(), Path::new("/sec/trusted_publishers.json"));
    }

    #[test]
    fn relative_root_is_anchored() {
        let paths = SecurityPaths::new("sec");
        assert!(paths.root().is_absolute());
        assert_eq!(paths.root(), std::env::current_dir().unwrap().join("sec"));
    }
}
