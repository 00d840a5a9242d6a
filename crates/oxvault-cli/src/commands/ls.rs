//! List command - list directory contents in a vault.
//!
//! # Examples
//!
//! ```bash
//! # List root directory
//! oxvault ls ~/vault
//!
//! # List with sizes
//! oxvault ls ~/vault /documents -l
//!
//! # Output as JSON for scripting
//! oxvault ls ~/vault --json / | jq '.entries[].name'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::{instrument, warn};

use oxvault_core::vault::{CipherEntry, EntryType, VaultPath};

use super::Access;
use crate::output::{create_table, format_entry_type, format_size};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Path within the vault (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show type and size
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for ls command
#[derive(Serialize)]
struct LsOutput {
    path: String,
    entries: Vec<EntryInfo>,
    unreadable: Vec<String>,
}

#[derive(Serialize)]
struct EntryInfo {
    name: String,
    #[serde(rename = "type")]
    entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub fn execute(access: &Access, args: &Args) -> Result<()> {
    let path = VaultPath::new(&args.path);

    let mut entries = Vec::new();
    let mut unreadable = Vec::new();
    for child in access.list(&path)? {
        match child {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                unreadable.push(e.container.to_string());
            }
        }
    }
    // Directories first, then by name
    entries.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.name().cmp(b.name()))
    });

    if args.json {
        let output = LsOutput {
            path: path.to_string(),
            entries: entries
                .iter()
                .map(|entry| EntryInfo {
                    name: entry.name().to_string(),
                    entry_type: format_entry_type(entry.kind),
                    size: file_size(access, entry),
                })
                .collect(),
            unreadable: unreadable.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if args.long {
        let mut table = create_table();
        table.set_header(vec!["Name", "Type", "Size"]);
        for entry in &entries {
            let size = file_size(access, entry).map_or_else(|| "-".to_string(), format_size);
            table.add_row(vec![
                entry.name().to_string(),
                format_entry_type(entry.kind).to_string(),
                size,
            ]);
        }
        println!("{table}");
    } else {
        for entry in &entries {
            if entry.is_directory() {
                println!("{}/", entry.name());
            } else {
                println!("{}", entry.name());
            }
        }
    }

    if !unreadable.is_empty() && !args.json {
        eprintln!("{} entries could not be read", unreadable.len());
    }

    Ok(())
}

/// Cleartext size for files; damaged files show no size.
fn file_size(access: &Access, entry: &CipherEntry) -> Option<u64> {
    if entry.kind != EntryType::File {
        return None;
    }
    match access.file_size(&entry.path) {
        Ok(size) => Some(size),
        Err(e) => {
            warn!(path = %entry.path, error = %e, "Could not determine file size");
            None
        }
    }
}
