//! Local package store for knowledge archives.
//!
//! Installs verified archives into a content directory and keeps an index
//! of what is installed. The index can be repaired when it drifts from the
//! filesystem.
//!
//! # Architecture
//!
//! - **Installer**: verification gate, staging, atomic package swap
//! - **IndexManager**: `index.json`, locked read-modify-write, doctor
//! - **StoreManager**: the facade callers use for every store operation

pub mod error;
pub mod index;
pub mod installer;
pub mod manager;
pub mod meta;
pub mod paths;

// Re-exports for convenience.
pub use error::{Result, StoreError};
pub use index::{DoctorReport, IndexEntry, IndexManager, StoreIndex};
pub use installer::Installer;
pub use manager::{ArchiveSource, PackageInfo, StoreManager};
pub use meta::PackageMeta;
pub use paths::StorePaths;
