//! `ark store`: install and manage packages in the local store.

use anyhow::{bail, Context, Result};
use ark_security::KeyManager;
use ark_store::{ArchiveSource, StoreManager};

use crate::commands::report_recovery;
use crate::config::ArkConfig;

fn open(config: &ArkConfig) -> Result<StoreManager> {
    let keys = KeyManager::new(config.security_paths());
    let store = StoreManager::open(config.store_paths(), keys).context("opening store")?;
    report_recovery("store index", store.recovery());
    Ok(store)
}

/// Install an archive from a path or URL.
pub fn install(config: &ArkConfig, source: &str, allow_untrusted: bool) -> Result<()> {
    let mut store = open(config)?;
    let source = ArchiveSource::parse(source);
    let entry = store
        .install(&source, allow_untrusted)
        .context("install failed")?;

    println!("Installed {} v{} ({})", entry.id, entry.version, entry.title);
    println!("  publisher: {}", entry.publisher_id);
    if !entry.signature_ok {
        println!("  WARNING: signature not verified; installed on explicit override");
    }
    Ok(())
}

pub fn list(config: &ArkConfig) -> Result<()> {
    let store = open(config)?;
    let entries = store.list();
    if entries.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }
    println!("{} package(s):", entries.len());
    for e in entries {
        let status = match (e.is_corrupted, e.signature_ok) {
            (true, _) => "CORRUPTED",
            (false, true) => "verified",
            (false, false) => "UNVERIFIED",
        };
        println!(
            "  {} v{}  {}  [{}; {}]",
            e.id, e.version, e.title, e.publisher_id, status
        );
    }
    Ok(())
}

pub fn info(config: &ArkConfig, id: &str) -> Result<()> {
    let store = open(config)?;
    let info = store.get_info(id)?;
    let entry = &info.entry;

    println!("{} v{}", entry.title, entry.version);
    println!("  id:           {}", entry.id);
    println!("  path:         {}", entry.path.display());
    println!("  installed:    {}", entry.installed_at.to_rfc3339());
    println!("  publisher:    {}", entry.publisher_id);
    println!("  signature ok: {}", entry.signature_ok);
    println!("  trusted:      {}", entry.trusted);
    println!("  corrupted:    {}", entry.is_corrupted);
    match &info.meta {
        Some(meta) => {
            println!("  author:       {}", meta.author);
            if let Some(description) = &meta.description {
                println!("  description:  {description}");
            }
            println!("  documents:    {}", meta.doc_count);
            println!("  embeddings:   {}", meta.embedding_count);
            println!("  size:         {} bytes", meta.total_size_bytes);
            println!("  checksum:     {}", meta.checksum);
        }
        None => println!("  (meta.json unavailable)"),
    }
    Ok(())
}

pub fn remove(config: &ArkConfig, id: &str) -> Result<()> {
    let mut store = open(config)?;
    store.remove(id)?;
    println!("Removed {id}");
    Ok(())
}

pub fn doctor(config: &ArkConfig) -> Result<()> {
    let mut store = open(config)?;
    let report = store.doctor()?;
    for id in &report.removed {
        println!("Removed orphaned index entry: {id}");
    }
    println!("Doctor finished. Fixed {} issue(s).", report.fixed);
    Ok(())
}

/// Re-hash an installed package. Fails if the stored copy changed.
pub fn check(config: &ArkConfig, id: &str) -> Result<()> {
    let mut store = open(config)?;
    if !store.check(id)? {
        bail!("package '{id}' is corrupted: stored archive does not match its meta");
    }
    println!("{id}: ok");
    Ok(())
}
