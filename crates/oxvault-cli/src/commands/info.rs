//! Info command - show key file parameters without unlocking.
//!
//! # Examples
//!
//! ```bash
//! oxvault info ~/vault
//! oxvault info ~/vault --json
//! ```

use std::path::Path;

use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use crate::GlobalOptions;
use crate::output::create_table;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for info command
#[derive(Serialize)]
struct VaultInfo {
    vault_path: String,
    key_file: String,
    format: u32,
    cipher: &'static str,
    scrypt_cost: i32,
    scrypt_block_size: i32,
}

#[instrument(level = "info", name = "cmd::info", skip_all, fields(vault = %vault_path.display()))]
pub fn execute(opts: &GlobalOptions, vault_path: &Path, args: &Args) -> Result<()> {
    let locked = opts.locked(vault_path)?;
    if !locked.contains_vault()? {
        bail!("No vault found at {}", vault_path.display());
    }
    let key_file = locked.key_file()?;

    let info = VaultInfo {
        vault_path: vault_path.display().to_string(),
        key_file: locked.key_file_name().to_string(),
        format: key_file.version,
        cipher: "SIV_CTRMAC",
        scrypt_cost: key_file.scrypt_cost_param,
        scrypt_block_size: key_file.scrypt_block_size,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Vault Path", &info.vault_path]);
        table.add_row(vec!["Key File", &info.key_file]);
        table.add_row(vec!["Format", &info.format.to_string()]);
        table.add_row(vec!["Cipher", info.cipher]);
        table.add_row(vec!["Scrypt N", &info.scrypt_cost.to_string()]);
        table.add_row(vec!["Scrypt r", &info.scrypt_block_size.to_string()]);
        println!("{table}");
    }

    Ok(())
}
