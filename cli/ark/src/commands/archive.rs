//! `ark validate` and `ark info`: inspect archive files.

use std::path::Path;

use anyhow::{Context, Result};
use ark_format::{loader, ChecksumStatus, SignatureBlock};

/// Schema-validate an archive and check its header checksum.
///
/// A checksum mismatch is reported but is not an error here; `ark verify`
/// is the enforcing check.
pub fn validate(path: &Path) -> Result<()> {
    let (archive, status) =
        loader::load_checked(path).with_context(|| format!("validating {}", path.display()))?;

    println!(
        "valid: {} v{} ({})",
        archive.header.id, archive.header.version, archive.header.title
    );
    match status {
        ChecksumStatus::Match => println!("checksum: ok"),
        ChecksumStatus::Mismatch { declared, actual } => {
            println!("checksum: MISMATCH");
            println!("  declared: {}", if declared.is_empty() { "(none)" } else { declared.as_str() });
            println!("  actual:   {actual}");
        }
    }
    Ok(())
}

/// Print a summary of an archive.
pub fn info(path: &Path) -> Result<()> {
    let archive = loader::load(path).with_context(|| format!("loading {}", path.display()))?;
    let header = &archive.header;

    println!("{} v{}", header.title, header.version);
    println!("  id:         {}", header.id);
    println!("  author:     {}", header.author);
    println!("  license:    {}", header.license);
    println!("  created:    {}", header.created_at);
    println!("  language:   {}", archive.metadata.language);
    println!("  risk level: {}", archive.metadata.risk_level);
    if !archive.metadata.tags.is_empty() {
        println!("  tags:       {}", archive.metadata.tags.join(", "));
    }
    println!("  documents:  {}", archive.content.docs.len());
    if let Some(uri) = &archive.content.vector_index_uri {
        println!("  vectors:    {uri}");
    }
    match &archive.signature_block {
        Some(SignatureBlock {
            public_key_id,
            signed_at,
            ..
        }) => println!("  signed by:  {public_key_id} at {signed_at}"),
        None => println!("  signed by:  (unsigned)"),
    }
    Ok(())
}
