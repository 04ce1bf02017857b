//! Ed25519 key material per publisher.
//!
//! Private keys are stored unencrypted as PKCS#8 PEM under
//! `keys/<publisher-id>/private_key.pem` and never leave that directory.
//! Public keys are SubjectPublicKeyInfo PEM. Verification resolves public
//! keys from the trust registry first, so a verifying machine does not need
//! a keys directory at all.

use std::path::{Path, PathBuf};

use ark_format::{durable, is_safe_component};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{Result, SecurityError};
use crate::paths::SecurityPaths;
use crate::trust::{Publisher, TrustRegistry};

/// PEM tag for Ed25519 public keys.
const PUBLIC_PEM_TAG: &str = "PUBLIC KEY";

/// PEM tag for PKCS#8 private keys.
const PRIVATE_PEM_TAG: &str = "PRIVATE KEY";

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (OID 1.3.101.112).
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, // SEQUENCE, 42 bytes
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112
    0x03, 0x21, 0x00, // BIT STRING, 33 bytes, 0 unused bits
];

/// DER prefix of an Ed25519 PKCS#8 v1 private key.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER 0 (version)
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes (seed)
];

/// Result of generating a keypair.
#[derive(Debug, Clone)]
pub struct GeneratedKeypair {
    /// PEM of the public key.
    pub public_key_pem: String,
    /// Where the private key was written.
    pub private_key_path: PathBuf,
    /// Where the public key was written.
    pub public_key_path: PathBuf,
}

/// Where a resolved public key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Cached PEM in the trust registry.
    Registry,
    /// `keys/<publisher-id>/public_key.pem` on this machine.
    KeysDir,
}

/// A public key together with the trust decision attached to it.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// The verifying key.
    pub key: VerifyingKey,
    /// Where it was found.
    pub source: KeySource,
    /// `false` only when the registry explicitly marks the publisher as
    /// untrusted.
    pub trusted: bool,
}

/// Generates and looks up publisher keys under a security root.
#[derive(Debug, Clone)]
pub struct KeyManager {
    paths: SecurityPaths,
}

impl KeyManager {
    /// Create a key manager for a security root.
    pub fn new(paths: SecurityPaths) -> Self {
        KeyManager { paths }
    }

    /// The security root layout.
    pub fn paths(&self) -> &SecurityPaths {
        &self.paths
    }

    /// Generate a fresh Ed25519 keypair and persist both halves.
    ///
    /// Refuses to touch an existing private key; see
    /// [`KeyManager::replace_keypair`].
    pub fn generate_keypair(&self, publisher_id: &str) -> Result<GeneratedKeypair> {
        self.write_keypair(publisher_id, false)
    }

    /// Generate a fresh keypair, overwriting any existing one. Archives
    /// signed with the old key no longer verify against this machine's
    /// keys directory.
    pub fn replace_keypair(&self, publisher_id: &str) -> Result<GeneratedKeypair> {
        self.write_keypair(publisher_id, true)
    }

    fn write_keypair(&self, publisher_id: &str, overwrite: bool) -> Result<GeneratedKeypair> {
        check_publisher_id(publisher_id)?;
        if !overwrite && self.paths.private_key_path(publisher_id).exists() {
            return Err(SecurityError::KeyExists {
                publisher_id: publisher_id.to_string(),
            });
        }

        let dir = self.paths.publisher_dir(publisher_id);
        std::fs::create_dir_all(&dir).map_err(|e| SecurityError::KeyGeneration {
            publisher_id: publisher_id.to_string(),
            detail: format!("creating {}: {e}", dir.display()),
        })?;

        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key_pem = encode_public_key_pem(&signing_key.verifying_key());
        let private_key_pem = encode_private_key_pem(&signing_key);

        let private_key_path = self.paths.private_key_path(publisher_id);
        let public_key_path = self.paths.public_key_path(publisher_id);
        let write_failed = |e: ark_format::FormatError| SecurityError::KeyGeneration {
            publisher_id: publisher_id.to_string(),
            detail: e.to_string(),
        };
        durable::write_atomic_private(&private_key_path, private_key_pem.as_bytes())
            .map_err(write_failed)?;
        durable::write_atomic(&public_key_path, public_key_pem.as_bytes()).map_err(write_failed)?;

        tracing::info!(publisher = %publisher_id, path = %dir.display(), "generated Ed25519 keypair");
        Ok(GeneratedKeypair {
            public_key_pem,
            private_key_path,
            public_key_path,
        })
    }

    /// Load the publisher's signing key.
    ///
    /// Returns `Ok(None)` if no private key exists on this machine; callers
    /// treat that as "cannot sign", not as corruption.
    pub fn get_private_key(&self, publisher_id: &str) -> Result<Option<SigningKey>> {
        if !is_safe_component(publisher_id) {
            return Ok(None);
        }
        let path = self.paths.private_key_path(publisher_id);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        decode_private_key_pem(&text)
            .map(Some)
            .map_err(|detail| SecurityError::InvalidKey { path, detail })
    }

    /// PEM of the publisher's public key: the registry's cached copy if
    /// present, otherwise the local keys directory.
    pub fn get_public_key_pem(&self, publisher_id: &str) -> Result<Option<String>> {
        let registry = TrustRegistry::open(&self.paths)?;
        Ok(self.public_key_pem_from(&registry, publisher_id))
    }

    /// The publisher's public key, if one can be found and parsed.
    pub fn load_public_key(&self, publisher_id: &str) -> Result<Option<VerifyingKey>> {
        Ok(self.resolve_public_key(publisher_id)?.map(|r| r.key))
    }

    /// Resolve a publisher's public key and its trust flag.
    ///
    /// Registry records win over the keys directory. A key found only in
    /// the local keys directory was generated on this machine and counts as
    /// trusted. Unparseable keys are logged and treated as absent.
    pub fn resolve_public_key(&self, publisher_id: &str) -> Result<Option<ResolvedKey>> {
        let registry = TrustRegistry::open(&self.paths)?;
        let record = registry.get(publisher_id);
        let trusted = record.map_or(true, |p| p.trusted);
        let source = match record.and_then(|p| p.public_key_pem.as_ref()) {
            Some(_) => KeySource::Registry,
            None => KeySource::KeysDir,
        };

        let Some(pem) = self.public_key_pem_from(&registry, publisher_id) else {
            tracing::debug!(publisher = %publisher_id, "no public key in registry or keys directory");
            return Ok(None);
        };
        match decode_public_key_pem(&pem) {
            Ok(key) => Ok(Some(ResolvedKey {
                key,
                source,
                trusted,
            })),
            Err(detail) => {
                tracing::error!(publisher = %publisher_id, %detail, "error loading public key");
                Ok(None)
            }
        }
    }

    /// Register this machine's key for `publisher_id` as a trusted
    /// publisher.
    pub fn trust_local_publisher(&self, publisher_id: &str, display_name: &str) -> Result<Publisher> {
        check_publisher_id(publisher_id)?;
        let path = self.paths.public_key_path(publisher_id);
        if !path.is_file() {
            return Err(SecurityError::KeyNotFound {
                publisher_id: publisher_id.to_string(),
            });
        }
        let pem = std::fs::read_to_string(&path)?;
        decode_public_key_pem(&pem).map_err(|detail| SecurityError::InvalidKey {
            path: path.clone(),
            detail,
        })?;

        let publisher = Publisher::new(
            publisher_id,
            display_name,
            pem.trim(),
            format!("keys/{publisher_id}/public_key.pem"),
        );
        let mut registry = TrustRegistry::open(&self.paths)?;
        registry.add(publisher.clone())?;
        Ok(publisher)
    }

    fn public_key_pem_from(&self, registry: &TrustRegistry, publisher_id: &str) -> Option<String> {
        if let Some(pem) = registry.get(publisher_id).and_then(|p| p.public_key_pem.clone()) {
            return Some(pem);
        }
        if !is_safe_component(publisher_id) {
            return None;
        }
        let path = self.paths.public_key_path(publisher_id);
        read_trimmed(&path)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            tracing::warn!(path = %path.display(), err = %e, "cannot read public key");
            None
        }
    }
}

fn check_publisher_id(publisher_id: &str) -> Result<()> {
    if is_safe_component(publisher_id) {
        Ok(())
    } else {
        Err(SecurityError::InvalidPublisherId {
            id: publisher_id.to_string(),
        })
    }
}

/// Encode an Ed25519 public key as SubjectPublicKeyInfo PEM.
pub fn encode_public_key_pem(key: &VerifyingKey) -> String {
    let mut der = Vec::with_capacity(ED25519_SPKI_PREFIX.len() + 32);
    der.extend_from_slice(&ED25519_SPKI_PREFIX);
    der.extend_from_slice(key.as_bytes());
    pem::encode(&pem::Pem::new(PUBLIC_PEM_TAG, der))
}

/// Decode a SubjectPublicKeyInfo PEM into an Ed25519 public key.
pub fn decode_public_key_pem(pem_str: &str) -> std::result::Result<VerifyingKey, String> {
    let der = decode_der(pem_str, PUBLIC_PEM_TAG, &ED25519_SPKI_PREFIX)?;
    VerifyingKey::from_bytes(&der).map_err(|e| format!("invalid Ed25519 public key: {e}"))
}

fn encode_private_key_pem(key: &SigningKey) -> String {
    let mut der = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + 32);
    der.extend_from_slice(&ED25519_PKCS8_PREFIX);
    der.extend_from_slice(&key.to_bytes());
    pem::encode(&pem::Pem::new(PRIVATE_PEM_TAG, der))
}

fn decode_private_key_pem(pem_str: &str) -> std::result::Result<SigningKey, String> {
    let seed = decode_der(pem_str, PRIVATE_PEM_TAG, &ED25519_PKCS8_PREFIX)?;
    Ok(SigningKey::from_bytes(&seed))
}

fn decode_der(pem_str: &str, tag: &str, prefix: &[u8]) -> std::result::Result<[u8; 32], String> {
    let parsed = pem::parse(pem_str).map_err(|e| format!("invalid PEM: {e}"))?;
    if parsed.tag() != tag {
        return Err(format!("expected tag '{tag}', got '{}'", parsed.tag()));
    }
    let der = parsed.contents();
    if der.len() != prefix.len() + 32 {
        return Err(format!(
            "invalid DER length: expected {}, got {}",
            prefix.len() + 32,
            der.len()
        ));
    }
    if &der[..prefix.len()] != prefix {
        return Err("DER is not an Ed25519 key".to_string());
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&der[prefix.len()..]);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, KeyManager) {
        let dir = tempfile::tempdir().unwrap();
        let keys = KeyManager::new(SecurityPaths::new(dir.path()));
        (dir, keys)
    }

    #[test]
    fn generate_writes_both_halves() {
        let (_dir, keys) = manager();
        let generated = keys.generate_keypair("lab-01").unwrap();

        assert!(generated.private_key_path.ends_with("keys/lab-01/private_key.pem"));
        assert!(generated.private_key_path.is_file());
        assert!(generated.public_key_path.is_file());
        assert!(generated.public_key_pem.contains("-----BEGIN PUBLIC KEY-----"));

        let private = keys.get_private_key("lab-01").unwrap().unwrap();
        let public = keys.load_public_key("lab-01").unwrap().unwrap();
        assert_eq!(private.verifying_key(), public);
    }

    #[test]
    fn existing_key_is_not_overwritten() {
        let (_dir, keys) = manager();
        keys.generate_keypair("lab-01").unwrap();
        let before = keys.get_private_key("lab-01").unwrap().unwrap().to_bytes();

        assert!(matches!(
            keys.generate_keypair("lab-01"),
            Err(SecurityError::KeyExists { .. })
        ));
        assert_eq!(keys.get_private_key("lab-01").unwrap().unwrap().to_bytes(), before);

        keys.replace_keypair("lab-01").unwrap();
        assert_ne!(keys.get_private_key("lab-01").unwrap().unwrap().to_bytes(), before);
    }

    #[test]
    fn private_key_is_pkcs8() {
        let (_dir, keys) = manager();
        let generated = keys.generate_keypair("lab-01").unwrap();
        let text = std::fs::read_to_string(&generated.private_key_path).unwrap();
        let parsed = pem::parse(&text).unwrap();
        assert_eq!(parsed.tag(), "PRIVATE KEY");
        assert_eq!(parsed.contents().len(), 48);
    }

    #[test]
    fn absent_private_key_is_none() {
        let (_dir, keys) = manager();
        assert!(keys.get_private_key("nobody").unwrap().is_none());
        assert!(keys.load_public_key("nobody").unwrap().is_none());
        assert!(keys.get_public_key_pem("nobody").unwrap().is_none());
    }

    #[test]
    fn corrupt_private_key_is_an_error() {
        let (_dir, keys) = manager();
        let generated = keys.generate_keypair("lab-01").unwrap();
        std::fs::write(&generated.private_key_path, "garbage").unwrap();
        assert!(matches!(
            keys.get_private_key("lab-01"),
            Err(SecurityError::InvalidKey { .. })
        ));
    }

    #[test]
    fn invalid_publisher_id_rejected() {
        let (_dir, keys) = manager();
        assert!(matches!(
            keys.generate_keypair("../evil"),
            Err(SecurityError::InvalidPublisherId { .. })
        ));
    }

    #[test]
    fn unwritable_root_fails_generation() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let keys = KeyManager::new(SecurityPaths::new(&blocker));
        assert!(matches!(
            keys.generate_keypair("lab-01"),
            Err(SecurityError::KeyGeneration { .. })
        ));
    }

    #[test]
    fn registry_pem_preferred_over_keys_dir() {
        let (_dir, keys) = manager();
        keys.generate_keypair("lab-01").unwrap();
        let other = SigningKey::generate(&mut OsRng);

        let mut registry = TrustRegistry::open(keys.paths()).unwrap();
        registry
            .add(Publisher::new(
                "lab-01",
                "Lab",
                encode_public_key_pem(&other.verifying_key()),
                "elsewhere.pem",
            ))
            .unwrap();

        let resolved = keys.resolve_public_key("lab-01").unwrap().unwrap();
        assert_eq!(resolved.source, KeySource::Registry);
        assert_eq!(resolved.key, other.verifying_key());
        assert!(resolved.trusted);
    }

    #[test]
    fn falls_back_to_keys_dir() {
        let (_dir, keys) = manager();
        keys.generate_keypair("lab-01").unwrap();
        let resolved = keys.resolve_public_key("lab-01").unwrap().unwrap();
        assert_eq!(resolved.source, KeySource::KeysDir);
        assert!(resolved.trusted);
    }

    #[test]
    fn distrusted_record_is_reported() {
        let (_dir, keys) = manager();
        let generated = keys.generate_keypair("lab-01").unwrap();
        let mut publisher = Publisher::new("lab-01", "Lab", generated.public_key_pem, "k.pem");
        publisher.trusted = false;
        TrustRegistry::open(keys.paths()).unwrap().add(publisher).unwrap();

        let resolved = keys.resolve_public_key("lab-01").unwrap().unwrap();
        assert!(!resolved.trusted);
    }

    #[test]
    fn malformed_registry_pem_is_absent() {
        let (_dir, keys) = manager();
        TrustRegistry::open(keys.paths())
            .unwrap()
            .add(Publisher::new("lab-01", "Lab", "not a pem", "k.pem"))
            .unwrap();
        assert!(keys.load_public_key("lab-01").unwrap().is_none());
    }

    #[test]
    fn trust_local_publisher_registers_key() {
        let (_dir, keys) = manager();
        keys.generate_keypair("lab-01").unwrap();
        let publisher = keys.trust_local_publisher("lab-01", "Lab One").unwrap();
        assert!(publisher.trusted);

        let registry = TrustRegistry::open(keys.paths()).unwrap();
        let stored = registry.get("lab-01").unwrap();
        assert_eq!(stored.public_key_path, "keys/lab-01/public_key.pem");
        assert!(stored.public_key_pem.as_ref().unwrap().starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn pem_roundtrip_and_rejection() {
        let key = SigningKey::from_bytes(&[0x42; 32]);
        let pem = encode_public_key_pem(&key.verifying_key());
        assert_eq!(decode_public_key_pem(&pem).unwrap(), key.verifying_key());

        assert!(decode_public_key_pem("not a pem").is_err());
        let private = encode_private_key_pem(&key);
        assert!(decode_public_key_pem(&private).is_err());
        assert_eq!(decode_private_key_pem(&private).unwrap().to_bytes(), key.to_bytes());
    }
}
