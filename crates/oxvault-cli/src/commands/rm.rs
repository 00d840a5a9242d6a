use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvault_core::vault::{VaultOperationError, VaultPath};

use super::Access;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to remove
    pub path: String,

    /// Remove directories and their contents recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Ignore nonexistent paths
    #[arg(short, long)]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::rm", skip_all, fields(path = %args.path, recursive = args.recursive))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let path = VaultPath::new(&args.path);

    let entry = match access.resolve(&path) {
        Ok(entry) => entry,
        Err(VaultOperationError::NotFound { .. }) if args.force => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if entry.is_directory() && !args.recursive && !access.list(&path)?.is_empty() {
        bail!("Directory not empty: {path} (use -r to remove it with its contents)");
    }

    let stats = access.delete(&path)?;
    if entry.is_directory() {
        eprintln!(
            "Deleted {} files and {} directories",
            stats.files_deleted, stats.directories_deleted
        );
    }
    Ok(())
}
