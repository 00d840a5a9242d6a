//! Init command - create a new vault in a directory.
//!
//! Creation clears whatever the directory already holds, so a non-empty
//! directory needs `--force`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvault_core::storage::LocalStorage;
use oxvault_core::vault::{KdfConfig, VaultCreator};

use crate::GlobalOptions;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory to hold the vault (created if missing)
    pub dir: PathBuf,

    /// Create the vault even if the directory is not empty, deleting its contents
    #[arg(long)]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::init", skip_all, fields(dir = %args.dir.display()))]
pub fn execute(opts: &GlobalOptions, args: &Args) -> Result<()> {
    fs::create_dir_all(&args.dir)
        .with_context(|| format!("Failed to create {}", args.dir.display()))?;

    let non_empty = fs::read_dir(&args.dir)
        .with_context(|| format!("Failed to read {}", args.dir.display()))?
        .next()
        .is_some();
    if non_empty && !args.force {
        bail!(
            "{} is not empty; pass --force to delete its contents and create a vault there",
            args.dir.display()
        );
    }

    let mut passphrase = opts.new_passphrase()?;
    let storage = LocalStorage::new(&args.dir)?;
    let vault = VaultCreator::new(storage, &opts.key_file)
        .with_kdf(KdfConfig::default())
        .create(&mut passphrase)
        .with_context(|| format!("Failed to create vault at {}", args.dir.display()))?;
    drop(vault.lock());

    if !opts.quiet {
        eprintln!("Created vault at {}", args.dir.display());
    }
    Ok(())
}
