//! Write command - copy stdin into a vault file.
//!
//! # Examples
//!
//! ```bash
//! # Replace a file's content
//! cat notes.txt | oxvault write ~/vault /notes.txt --truncate
//!
//! # Patch bytes at an offset
//! printf 'XY' | oxvault write ~/vault /notes.txt --offset 10
//! ```

use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::{debug, instrument};

use oxvault_core::fs::AccessMode;
use oxvault_core::vault::{VaultOperationError, VaultPath};

use super::Access;

#[derive(ClapArgs)]
pub struct Args {
    /// Path to the file within the vault
    pub path: String,

    /// Cleartext offset to start writing at
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Discard existing content first
    #[arg(long, conflicts_with = "offset")]
    pub truncate: bool,
}

#[instrument(level = "info", name = "cmd::write", skip_all, fields(path = %args.path, offset = args.offset))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let path = VaultPath::new(&args.path);
    let Some((parent, name)) = path.split() else {
        bail!("Cannot write to the vault root");
    };

    match access.resolve(&path) {
        Ok(_) => {}
        Err(VaultOperationError::NotFound { .. }) => {
            debug!("Creating missing file");
            access.create_file(&parent, name)?;
        }
        Err(e) => return Err(e.into()),
    }

    let mut data = Vec::new();
    io::stdin()
        .read_to_end(&mut data)
        .context("Failed to read stdin")?;

    let mode = if args.truncate {
        AccessMode::WRITE_TRUNCATE
    } else {
        AccessMode::READ_WRITE
    };
    let mut file = access.open_file(&path, mode)?;
    let written = file.write(args.offset, &data)?;
    file.close()?;

    debug!(bytes = written, "Write complete");
    Ok(())
}
