//! `ark sign` and `ark verify`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ark_security::{KeyManager, Signer, TrustRegistry, Verifier};

use crate::commands::report_recovery;
use crate::config::ArkConfig;

/// Sign an archive in place.
pub fn sign(config: &ArkConfig, path: &Path, publisher_id: &str) -> Result<()> {
    let signer = Signer::new(KeyManager::new(config.security_paths()));
    signer
        .sign(path, publisher_id)
        .with_context(|| format!("signing {}", path.display()))?;
    println!("Signed {} as '{publisher_id}'", path.display());
    Ok(())
}

/// Verify an archive's signature. Fails unless verification passed.
pub fn verify(config: &ArkConfig, path: &Path, json: bool) -> Result<()> {
    let keys = KeyManager::new(config.security_paths());
    let registry = TrustRegistry::open(keys.paths()).context("opening trust registry")?;
    report_recovery("trust registry", registry.recovery());

    let outcome = Verifier::new(keys).verify(path);

    if json {
        let report = serde_json::json!({
            "path": path.display().to_string(),
            "passed": outcome.passed,
            "publisher_id": outcome.publisher_id,
            "is_trusted": outcome.is_trusted,
            "reason": outcome.reason.to_string(),
            "kind": outcome.reason.kind().map(|k| k.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", path.display());
        println!("  passed:    {}", if outcome.passed { "yes" } else { "no" });
        println!(
            "  publisher: {}",
            outcome.publisher_id.as_deref().unwrap_or("(none)")
        );
        println!("  trusted:   {}", if outcome.is_trusted { "yes" } else { "no" });
        println!("  reason:    {}", outcome.reason);
    }

    if !outcome.passed {
        bail!("verification failed: {}", outcome.reason);
    }
    Ok(())
}
