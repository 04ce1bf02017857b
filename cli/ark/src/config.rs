//! `ark.toml` configuration and root directory resolution.
//!
//! Every path the CLI touches derives from a single home directory:
//! `--home`, else `$ARK_HOME`, else `$HOME/.kovcheg`. An optional
//! `<home>/ark.toml` may relocate the security and store roots and set the
//! default log filter:
//!
//! ```toml
//! security_root = "security"      # relative paths resolve against home
//! store_root = "/srv/ark_store"
//!
//! [log]
//! filter = "ark_store=info"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ark_security::SecurityPaths;
use ark_store::StorePaths;
use serde::Deserialize;

/// File name of the configuration file inside the home directory.
pub const CONFIG_FILE: &str = "ark.toml";

/// The on-disk configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    security_root: Option<PathBuf>,
    store_root: Option<PathBuf>,
    log: LogSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LogSection {
    filter: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct ArkConfig {
    /// Home directory everything else resolves against.
    pub home: PathBuf,
    /// Keys and trust registry.
    pub security_root: PathBuf,
    /// Installed packages and index.
    pub store_root: PathBuf,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl ArkConfig {
    /// Load `<home>/ark.toml` if present, falling back to defaults.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        let file = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<ConfigFile>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            ConfigFile::default()
        };
        Ok(Self::from_file(home, file))
    }

    fn from_file(home: &Path, file: ConfigFile) -> Self {
        let resolve = |p: Option<PathBuf>, default: &str| match p {
            Some(p) if p.is_absolute() => p,
            Some(p) => home.join(p),
            None => home.join(default),
        };
        ArkConfig {
            home: home.to_path_buf(),
            security_root: resolve(file.security_root, "security"),
            store_root: resolve(file.store_root, "ark_store"),
            log_filter: file.log.filter,
        }
    }

    pub fn security_paths(&self) -> SecurityPaths {
        SecurityPaths::new(&self.security_root)
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.store_root)
    }
}

/// Pick the home directory: explicit flag or `$ARK_HOME` (both arrive via
/// clap), else `$HOME/.kovcheg`.
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(home) = explicit {
        return std::path::absolute(home)
            .with_context(|| format!("resolving home directory {}", home.display()));
    }
    let user_home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .context("cannot determine home directory; pass --home or set ARK_HOME")?;
    Ok(PathBuf::from(user_home).join(".kovcheg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArkConfig::load(dir.path()).unwrap();
        assert_eq!(config.security_root, dir.path().join("security"));
        assert_eq!(config.store_root, dir.path().join("ark_store"));
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn file_overrides_roots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "security_root = \"sec\"\nstore_root = \"/srv/store\"\n\n[log]\nfilter = \"debug\"\n",
        )
        .unwrap();

        let config = ArkConfig::load(dir.path()).unwrap();
        assert_eq!(config.security_root, dir.path().join("sec"));
        assert_eq!(config.store_root, PathBuf::from("/srv/store"));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn unknown_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "stor_root = \"x\"\n").unwrap();
        assert!(ArkConfig::load(dir.path()).is_err());
    }

    #[test]
    fn explicit_home_wins() {
        let home = resolve_home(Some(Path::new("/opt/ark"))).unwrap();
        assert_eq!(home, PathBuf::from("/opt/ark"));
    }

    #[test]
    fn relative_home_is_made_absolute() {
        let home = resolve_home(Some(Path::new("h"))).unwrap();
        assert_eq!(home, std::env::current_dir().unwrap().join("h"));

        let config = ArkConfig::load(&home).unwrap();
        assert!(config.store_paths().index_file().is_absolute());
    }
}
