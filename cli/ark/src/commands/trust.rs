//! `ark trust`: manage the local trust registry.

use std::path::Path;

use anyhow::{bail, Context, Result};
use ark_security::keys::decode_public_key_pem;
use ark_security::{Publisher, SecurityPaths, TrustRegistry};

use crate::commands::report_recovery;
use crate::config::ArkConfig;

fn open(paths: &SecurityPaths) -> Result<TrustRegistry> {
    let registry = TrustRegistry::open(paths).context("opening trust registry")?;
    report_recovery("trust registry", registry.recovery());
    Ok(registry)
}

/// Trust a publisher's public key read from a PEM file.
pub fn add(
    config: &ArkConfig,
    publisher_id: &str,
    key_path: &Path,
    display_name: Option<&str>,
) -> Result<()> {
    if !ark_format::is_safe_component(publisher_id) {
        bail!("invalid publisher id: '{publisher_id}'");
    }
    let pem = std::fs::read_to_string(key_path)
        .with_context(|| format!("reading {}", key_path.display()))?;
    if let Err(detail) = decode_public_key_pem(&pem) {
        bail!("{} is not an Ed25519 public key: {detail}", key_path.display());
    }

    let mut registry = open(&config.security_paths())?;
    let replaced = registry.get(publisher_id).is_some();
    registry.add(Publisher::new(
        publisher_id,
        display_name.unwrap_or(publisher_id),
        pem.trim(),
        key_path.display().to_string(),
    ))?;

    if replaced {
        println!("Replaced trusted key for '{publisher_id}'");
    } else {
        println!("Trusted publisher '{publisher_id}'");
    }
    Ok(())
}

/// Remove a publisher from the registry.
pub fn remove(config: &ArkConfig, publisher_id: &str) -> Result<()> {
    let mut registry = open(&config.security_paths())?;
    if !registry.remove(publisher_id)? {
        bail!("publisher '{publisher_id}' is not in the trust registry");
    }
    println!("Removed publisher '{publisher_id}'");
    Ok(())
}

/// List registry entries.
pub fn list(config: &ArkConfig) -> Result<()> {
    let registry = open(&config.security_paths())?;
    let publishers = registry.list();
    if publishers.is_empty() {
        println!("No trusted publishers.");
        return Ok(());
    }
    println!("{} publisher(s):", publishers.len());
    for p in publishers {
        println!(
            "  {} ({}){} added {}",
            p.id,
            p.display_name,
            if p.trusted { "" } else { " [distrusted]" },
            p.added_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}
