//! `ark keys generate`: create a publisher keypair on this machine.

use anyhow::{Context, Result};
use ark_security::{KeyManager, SecurityError};

use crate::config::ArkConfig;

/// Generate a keypair for `publisher_id`, optionally trusting it locally.
/// An existing keypair is only replaced with `force`.
pub fn generate(
    config: &ArkConfig,
    publisher_id: &str,
    trust: bool,
    display_name: Option<&str>,
    force: bool,
) -> Result<()> {
    let keys = KeyManager::new(config.security_paths());
    let result = if force {
        keys.replace_keypair(publisher_id)
    } else {
        keys.generate_keypair(publisher_id)
    };
    let generated = match result {
        Err(e @ SecurityError::KeyExists { .. }) => {
            return Err(anyhow::Error::new(e).context("pass --force to replace it"))
        }
        other => other.with_context(|| format!("generating keys for '{publisher_id}'"))?,
    };

    println!("Generated Ed25519 keypair for '{publisher_id}'");
    println!("  private key: {}", generated.private_key_path.display());
    println!("  public key:  {}", generated.public_key_path.display());

    if trust {
        let publisher = keys
            .trust_local_publisher(publisher_id, display_name.unwrap_or(publisher_id))
            .with_context(|| format!("trusting '{publisher_id}'"))?;
        println!("Trusted publisher '{}' ({})", publisher.id, publisher.display_name);
    } else {
        println!();
        print!("{}", generated.public_key_pem);
        if !generated.public_key_pem.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
