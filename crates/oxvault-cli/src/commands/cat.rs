use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvault_core::fs::AccessMode;
use oxvault_core::vault::VaultPath;

use super::Access;

/// Bytes decrypted per read; one ciphertext chunk worth of cleartext.
const READ_BLOCK: usize = 32 * 1024;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to the file within the vault
    pub path: String,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(path = %args.path))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let path = VaultPath::new(&args.path);
    let file = access.open_file(&path, AccessMode::READ)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut offset = 0u64;
    loop {
        let block = file.read(offset, READ_BLOCK)?;
        if block.is_empty() {
            break;
        }
        out.write_all(&block).context("Failed to write to stdout")?;
        offset += block.len() as u64;
    }
    out.flush()?;
    Ok(())
}
