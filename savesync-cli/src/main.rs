//! savesync: back up a directory into a shared directory.
//!
//! Reads `config.json` from the working directory, archives `save_dir` into
//! a timestamped zip and moves it with its SHA-256 checksum file into
//! `share_path`, unless an identical archive is already stored there.
//!
//! # Usage
//!
//! ```bash
//! # Sync using ./config.json
//! savesync
//!
//! # Use another configuration file
//! savesync --config /etc/savesync.json
//!
//! # Only validate configuration and directories
//! savesync --check
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use savesync_core::{SyncConfig, SyncError, SyncEvent, SyncOutcome, Syncer, CONFIG_FILE};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "savesync")]
#[command(author = "Savesync Contributors")]
#[command(version)]
#[command(about = "Back up a directory into a shared directory as content-hashed zip archives")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Validate configuration and directories without syncing
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("savesync_core=warn,savesync=warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("savesync: {:#}", err);
            exit_code(&err)
        }
    }
}

/// 2 when nothing was attempted (configuration or directory checks),
/// 1 when a sync failed part-way.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SyncError>() {
        Some(e) if e.is_preflight() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = SyncConfig::load(&cli.config)?;
    let settings = config.resolve(&cli.config)?;
    tracing::debug!(origin = %settings.origin, scope = ?settings.scope, "settings resolved");

    let syncer = Syncer::new(settings);
    syncer.check()?;

    if cli.check {
        let settings = syncer.settings();
        println!("Configuration OK.");
        println!("  Save dir:   {}", settings.save_dir.display());
        println!("  Share path: {}", settings.share_path.display());
        println!("  Host:       {}", settings.origin);
        return Ok(());
    }

    let outcome = syncer
        .sync(&mut print_event)
        .context("Synchronization failed")?;

    if let SyncOutcome::Persisted { archive, .. } = &outcome {
        tracing::debug!(archive = %archive.display(), "sync complete");
    }
    Ok(())
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::ArchiveCreated { archive, .. } => {
            println!("Created '{}'.", archive.display());
        }
        SyncEvent::Hashed { .. } => {}
        SyncEvent::DuplicateFound { existing } => {
            println!(
                "Synchronization skipped - file with this hash already exists: {}",
                existing.display()
            );
        }
        SyncEvent::LocalArchiveDeleted { archive } => {
            println!("Deleted '{}'.", archive.display());
        }
        SyncEvent::SidecarCreated { sidecar } => {
            println!("Created checksum file '{}'.", sidecar.display());
        }
        SyncEvent::FilesMoved { share_path } => {
            println!("Moved files to '{}'.", share_path.display());
        }
    }
}
