//! Ark CLI: sign, verify, trust, and install knowledge archives.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::ArkConfig;

#[derive(Parser)]
#[command(name = "ark", version, about = "Knowledge archive integrity, trust, and store")]
struct Cli {
    /// Home directory for keys, trust registry, store, and ark.toml
    /// (default: ~/.kovcheg)
    #[arg(long, global = true, env = "ARK_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an archive against the schema and its header checksum
    Validate {
        /// Archive file (.ark, .json, .yaml)
        path: PathBuf,
    },
    /// Show archive metadata
    Info {
        /// Archive file
        path: PathBuf,
    },
    /// Manage publisher keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Sign an archive in place
    Sign {
        /// Archive file
        path: PathBuf,
        /// Publisher id whose private key signs
        #[arg(long)]
        publisher: String,
    },
    /// Verify an archive signature
    Verify {
        /// Archive file
        path: PathBuf,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage trusted publishers
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },
    /// Manage the local package store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Generate an Ed25519 keypair for a publisher
    Generate {
        /// Publisher id
        publisher: String,
        /// Also add the new key to the local trust registry
        #[arg(long)]
        trust: bool,
        /// Display name recorded with --trust
        #[arg(long)]
        name: Option<String>,
        /// Replace an existing keypair for this publisher
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum TrustAction {
    /// Trust a publisher's public key
    Add {
        /// Publisher id
        publisher: String,
        /// PEM file with the publisher's public key
        #[arg(long)]
        key: PathBuf,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Stop trusting a publisher
    Remove {
        /// Publisher id
        publisher: String,
    },
    /// List trusted publishers
    List,
}

#[derive(Subcommand)]
enum StoreAction {
    /// Install an archive (path or URL)
    Install {
        /// Archive path or http(s) URL
        source: String,
        /// Install even if unsigned or from an unknown publisher
        #[arg(long)]
        allow_untrusted: bool,
    },
    /// List installed packages
    List,
    /// Show an installed package
    Info {
        /// Package id
        id: String,
    },
    /// Remove an installed package
    Remove {
        /// Package id
        id: String,
    },
    /// Drop index entries whose files are gone
    Doctor,
    /// Re-hash an installed package against its recorded checksum
    Check {
        /// Package id
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let home = config::resolve_home(cli.home.as_deref())?;
    let config = ArkConfig::load(&home)?;
    init_tracing(&config);
    tracing::debug!(
        home = %config.home.display(),
        security_root = %config.security_root.display(),
        store_root = %config.store_root.display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Validate { path } => commands::archive::validate(&path),
        Commands::Info { path } => commands::archive::info(&path),

        Commands::Keys { action } => match action {
            KeysAction::Generate {
                publisher,
                trust,
                name,
                force,
            } => commands::keys::generate(&config, &publisher, trust, name.as_deref(), force),
        },

        Commands::Sign { path, publisher } => commands::signature::sign(&config, &path, &publisher),
        Commands::Verify { path, json } => commands::signature::verify(&config, &path, json),

        Commands::Trust { action } => match action {
            TrustAction::Add {
                publisher,
                key,
                name,
            } => commands::trust::add(&config, &publisher, &key, name.as_deref()),
            TrustAction::Remove { publisher } => commands::trust::remove(&config, &publisher),
            TrustAction::List => commands::trust::list(&config),
        },

        Commands::Store { action } => match action {
            StoreAction::Install {
                source,
                allow_untrusted,
            } => commands::store::install(&config, &source, allow_untrusted),
            StoreAction::List => commands::store::list(&config),
            StoreAction::Info { id } => commands::store::info(&config, &id),
            StoreAction::Remove { id } => commands::store::remove(&config, &id),
            StoreAction::Doctor => commands::store::doctor(&config),
            StoreAction::Check { id } => commands::store::check(&config, &id),
        },
    }
}

/// Log to stderr. `RUST_LOG` wins over `[log] filter` in ark.toml; the
/// fallback is `warn`.
fn init_tracing(config: &ArkConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter.as_deref().unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
