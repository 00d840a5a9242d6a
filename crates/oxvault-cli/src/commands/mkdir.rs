use anyhow::{Result, bail};
use clap::Args as ClapArgs;
use tracing::{debug, instrument};

use oxvault_core::vault::{OpContext, VaultOperationError, VaultPath};

use super::Access;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory to create
    pub path: String,

    /// Create missing parents and accept an existing directory
    #[arg(short, long)]
    pub parents: bool,
}

#[instrument(level = "info", name = "cmd::mkdir", skip_all, fields(path = %args.path, parents = args.parents))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let path = VaultPath::new(&args.path);

    if !args.parents {
        let Some((parent, name)) = path.split() else {
            bail!("The vault root already exists");
        };
        access.create_directory(&parent, name)?;
        return Ok(());
    }

    let mut current = VaultPath::root();
    for component in path.components() {
        let next = current.join(component);
        match access.resolve(&next) {
            Ok(entry) if entry.is_directory() => {}
            Ok(_) => {
                return Err(VaultOperationError::NotADirectory {
                    context: OpContext::new().with_path(&next),
                }
                .into());
            }
            Err(VaultOperationError::NotFound { .. }) => {
                debug!(path = %next, "Creating directory");
                access.create_directory(&current, component)?;
            }
            Err(e) => return Err(e.into()),
        }
        current = next;
    }
    Ok(())
}
