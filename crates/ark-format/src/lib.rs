//! Knowledge archive format.
//!
//! Defines the archive data model, the loader used by every other crate to
//! read archives, the canonical content digest, and the durable-write
//! primitives shared by all persisted documents.
//!
//! # Architecture
//!
//! - **Archive**: header, metadata, content, optional signature block
//! - **Loader**: raw (unvalidated) and typed (validated) reads, atomic writes
//! - **Digest**: RFC 8785 canonical JSON + SHA-256 over `content`
//! - **Durable**: temp-file-then-rename writes and advisory document locks

pub mod archive;
pub mod digest;
pub mod durable;
pub mod error;
pub mod loader;

// Re-exports for convenience.
pub use archive::{
    is_safe_component, Archive, Content, Header, Metadata, SignatureBlock, SIGNATURE_ALGO,
};
pub use digest::{canonical_digest, ContentDigest};
pub use durable::{quarantine, write_atomic, write_atomic_private, CorruptDocument, FileLock};
pub use error::{FormatError, Result};
pub use loader::{load, load_checked, read_raw, write_raw, ArchiveFormat, ChecksumStatus};
