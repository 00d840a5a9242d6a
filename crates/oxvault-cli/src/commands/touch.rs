use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvault_core::vault::{NewEntry, VaultOperationError, VaultPath};

use super::Access;

#[derive(ClapArgs)]
pub struct Args {
    /// File to create
    pub path: String,

    /// Pick "name (1).ext" and so on when the name is taken
    #[arg(long)]
    pub unique: bool,
}

#[instrument(level = "info", name = "cmd::touch", skip_all, fields(path = %args.path))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let path = VaultPath::new(&args.path);
    let Some((parent, name)) = path.split() else {
        bail!("Cannot create the vault root");
    };

    if args.unique {
        let entry = access.create_unique(&parent, name, NewEntry::File)?;
        println!("{}", entry.path);
        return Ok(());
    }

    match access.create_file(&parent, name) {
        Ok(_) => Ok(()),
        // An existing file is left untouched
        Err(VaultOperationError::EntryAlreadyExists { .. }) => {
            if access.resolve(&path)?.is_file() {
                Ok(())
            } else {
                bail!("Not a file: {path}")
            }
        }
        Err(e) => Err(e.into()),
    }
}
