//! Publisher identity and archive signatures.
//!
//! Publishers own Ed25519 keypairs stored under a security root. A local
//! trust registry pins the public keys this machine accepts. Archives are
//! signed over the canonical digest of their content and verified against
//! that registry.
//!
//! # Architecture
//!
//! - **KeyManager**: keypair generation, PEM storage, public key resolution
//! - **TrustRegistry**: `trusted_publishers.json`, locked read-modify-write
//! - **Signer**: embeds a signature block and header checksum in place
//! - **Verifier**: ordered checks producing a four-part outcome

pub mod error;
pub mod keys;
pub mod paths;
pub mod signer;
pub mod trust;
pub mod verifier;

// Re-exports for convenience.
pub use error::{ErrorKind, Result, SecurityError};
pub use keys::{GeneratedKeypair, KeyManager, KeySource, ResolvedKey};
pub use paths::SecurityPaths;
pub use signer::Signer;
pub use trust::{Publisher, TrustRegistry, TrustedPublishers};
pub use verifier::{VerifyOutcome, VerifyReason, Verifier};
