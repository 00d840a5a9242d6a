use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use oxvault_core::vault::VaultPath;

use super::Access;

#[derive(ClapArgs)]
pub struct Args {
    /// Entry to rename
    pub source: String,

    /// New name, within the same directory
    pub new_name: String,
}

#[instrument(level = "info", name = "cmd::mv", skip_all, fields(source = %args.source, new_name = %args.new_name))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let source = VaultPath::new(&args.source);
    let renamed = access.rename(&source, &args.new_name)?;
    println!("{}", renamed.path);
    Ok(())
}
