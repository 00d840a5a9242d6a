use std::path::Path;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvault_core::vault::KdfConfig;

use crate::{GlobalOptions, prompt_new_passphrase};

#[derive(ClapArgs)]
pub struct Args {
    /// New passphrase (insecure, prefer the prompt)
    #[arg(long, env = "OXVAULT_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: Option<String>,
}

#[instrument(level = "info", name = "cmd::passwd", skip_all, fields(vault = %vault_path.display()))]
pub fn execute(opts: &GlobalOptions, vault_path: &Path, args: &Args) -> Result<()> {
    let locked = opts.locked(vault_path)?;
    let mut old_passphrase = opts.passphrase("Current passphrase: ")?;
    let mut new_passphrase = match &args.new_password {
        Some(password) => password.clone().into_bytes(),
        None => prompt_new_passphrase()?,
    };

    locked
        .change_passphrase(&mut old_passphrase, &mut new_passphrase, KdfConfig::default())
        .context("Failed to change passphrase")?;

    if !opts.quiet {
        eprintln!("Passphrase changed; the previous key file was kept as a backup");
    }
    Ok(())
}
