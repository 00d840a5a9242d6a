#![deny(unsafe_code)]

mod commands;
mod exit_code;
mod output;

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oxvault_core::crypto::CryptoError;
use oxvault_core::fs::content::ContentError;
use oxvault_core::storage::{LocalStorage, StorageError};
use oxvault_core::vault::{
    DEFAULT_KEY_FILE_NAME, LockedVault, UnlockedVault, VaultError, VaultOperationError,
};

use crate::commands::{cat, info, init, ls, mkdir, mv, passwd, rm, touch, write};

/// Command-line interface for encrypted vaults
#[derive(Parser)]
#[command(name = "oxvault")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Create a vault
    oxvault init ~/vault

    # List vault contents
    oxvault ls ~/vault /docs -l

    # Write stdin into a file, then read it back
    echo hello | oxvault write ~/vault /hello.txt --truncate
    oxvault cat ~/vault /hello.txt
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Vault passphrase (insecure, prefer the prompt or OXVAULT_PASSWORD)
    #[arg(long, env = "OXVAULT_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Name of the key file inside the vault directory
    #[arg(long, env = "OXVAULT_KEY_FILE", default_value = DEFAULT_KEY_FILE_NAME, global = true)]
    key_file: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ============ Vault file operations (require unlock) ============
    /// List directory contents
    Ls(VaultCommand<ls::Args>),

    /// Write file contents to stdout
    Cat(VaultCommand<cat::Args>),

    /// Write stdin to a file
    Write(VaultCommand<write::Args>),

    /// Create a directory
    Mkdir(VaultCommand<mkdir::Args>),

    /// Create an empty file
    Touch(VaultCommand<touch::Args>),

    /// Remove a file or directory
    Rm(VaultCommand<rm::Args>),

    /// Rename a file or directory
    Mv(VaultCommand<mv::Args>),

    // ============ Vault management ============
    /// Create a new vault
    Init(init::Args),

    /// Show key file and layout information
    Info(VaultCommand<info::Args>),

    /// Change the vault passphrase
    Passwd(VaultCommand<passwd::Args>),
}

/// Wrapper for commands that operate on a vault
#[derive(Parser, Clone)]
pub struct VaultCommand<T: clap::Args> {
    /// Path to the vault directory
    #[arg(value_name = "VAULT")]
    pub vault: PathBuf,

    #[command(flatten)]
    pub args: T,
}

/// Global options shared by every command.
pub struct GlobalOptions {
    pub password: Option<String>,
    pub key_file: String,
    pub quiet: bool,
}

impl GlobalOptions {
    /// Passphrase from `--password`/`OXVAULT_PASSWORD`, else an interactive prompt.
    pub fn passphrase(&self, prompt: &str) -> Result<Vec<u8>> {
        if let Some(password) = &self.password {
            return Ok(password.clone().into_bytes());
        }
        if !io::stdin().is_terminal() {
            bail!("No passphrase given: use --password or OXVAULT_PASSWORD when stdin is not a terminal");
        }
        let password = rpassword::prompt_password(prompt).context("Failed to read passphrase")?;
        Ok(password.into_bytes())
    }

    /// Prompt twice for a new passphrase unless one was supplied.
    pub fn new_passphrase(&self) -> Result<Vec<u8>> {
        match &self.password {
            Some(password) => Ok(password.clone().into_bytes()),
            None => prompt_new_passphrase(),
        }
    }

    pub fn locked(&self, vault: &Path) -> Result<LockedVault<LocalStorage>> {
        let storage = LocalStorage::new(vault)
            .with_context(|| format!("Vault directory {} is not usable", vault.display()))?;
        Ok(LockedVault::new(storage, &self.key_file))
    }

    pub fn unlock(&self, vault: &Path) -> Result<UnlockedVault<LocalStorage>> {
        let locked = self.locked(vault)?;
        let mut passphrase = self.passphrase("Vault passphrase: ")?;
        locked
            .unlock(&mut passphrase)
            .with_context(|| format!("Failed to unlock vault at {}", vault.display()))
    }
}

pub fn prompt_new_passphrase() -> Result<Vec<u8>> {
    let first = rpassword::prompt_password("New passphrase: ")?;
    let second = rpassword::prompt_password("Repeat passphrase: ")?;
    if first != second {
        bail!("Passphrases do not match");
    }
    if first.is_empty() {
        bail!("Passphrase must not be empty");
    }
    Ok(first.into_bytes())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let is_quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let opts = GlobalOptions {
        password: cli.password,
        key_file: cli.key_file,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Init(args) => init::execute(&opts, &args),
        Commands::Info(cmd) => info::execute(&opts, &cmd.vault, &cmd.args),
        Commands::Passwd(cmd) => passwd::execute(&opts, &cmd.vault, &cmd.args),

        Commands::Ls(cmd) => ls::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
        Commands::Cat(cmd) => cat::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
        Commands::Write(cmd) => write::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
        Commands::Mkdir(cmd) => mkdir::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
        Commands::Touch(cmd) => touch::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
        Commands::Rm(cmd) => rm::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
        Commands::Mv(cmd) => mv::execute(opts.unlock(&cmd.vault)?.access(), &cmd.args),
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // RUST_LOG takes precedence over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(vault_err) = cause.downcast_ref::<VaultError>() {
            match vault_err {
                VaultError::InvalidPassphrase | VaultError::PassphraseEncoding => {
                    return exit_code::AUTH_FAILED;
                }
                VaultError::KeyFileNotFound { .. } => return exit_code::NOT_FOUND,
                VaultError::UnsupportedVaultFormat { .. }
                | VaultError::MalformedKeyFile { .. }
                | VaultError::CapabilityMissing(_) => return exit_code::VAULT_INVALID,
                VaultError::ChildAlreadyExists { .. } => return exit_code::ALREADY_EXISTS,
                _ => {}
            }
        }

        if let Some(op_err) = cause.downcast_ref::<VaultOperationError>() {
            match op_err {
                VaultOperationError::NotFound { .. } => return exit_code::NOT_FOUND,
                VaultOperationError::EntryAlreadyExists { .. } => {
                    return exit_code::ALREADY_EXISTS;
                }
                VaultOperationError::MissingDirectoryMarker { .. }
                | VaultOperationError::InvalidDirectoryMarker { .. }
                | VaultOperationError::MissingShard { .. } => return exit_code::VAULT_INVALID,
                VaultOperationError::ReadOnly { .. } => return exit_code::PERMISSION_DENIED,
                _ => {}
            }
        }

        if let Some(content_err) = cause.downcast_ref::<ContentError>()
            && content_err.is_integrity_violation()
        {
            return exit_code::VAULT_INVALID;
        }

        if let Some(crypto_err) = cause.downcast_ref::<CryptoError>()
            && crypto_err.is_integrity_violation()
        {
            return exit_code::VAULT_INVALID;
        }

        if let Some(StorageError::NotFound { .. }) = cause.downcast_ref::<StorageError>() {
            return exit_code::NOT_FOUND;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::NotFound => return exit_code::NOT_FOUND,
                io::ErrorKind::Interrupted => return exit_code::CANCELLED,
                _ => {}
            }
        }
    }
    exit_code::GENERAL_ERROR
}
