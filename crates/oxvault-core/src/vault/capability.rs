//! Storage capability probing, run once before a vault is created.

use std::fmt;

use relative_path::{RelativePath, RelativePathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::{Storage, StorageError};

use super::config::CIPHERTEXT_SUFFIX;

/// Something a storage backend must support to hold a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Write,
    /// Names of about a hundred characters
    LongFilenames,
    /// Such names nested at least four levels deep
    LongPaths,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::LongFilenames => "long filenames",
            Capability::LongPaths => "long paths",
        })
    }
}

/// A failed capability probe.
#[derive(Error, Debug)]
#[error("Storage lacks the {capability} capability")]
pub struct MissingCapability {
    pub capability: Capability,
    #[source]
    pub source: Option<StorageError>,
}

impl MissingCapability {
    fn new(capability: Capability, source: StorageError) -> Self {
        Self {
            capability,
            source: Some(source),
        }
    }
}

/// Verifies a storage backend before anything is written to it.
pub trait CapabilityCheck<S: Storage> {
    fn check(&self, storage: &S) -> Result<(), MissingCapability>;
}

/// Directory the probes run in; removed afterwards.
pub const PROBE_DIR: &str = "c";

const PROBE_FILE: &str = "probe";
const NESTING_DIR: &str = "n";
const PROBE_CONTENT: &[u8] = b"oxvault capability probe";
const LONG_NAME_STEM_LEN: usize = 96;
const LONG_PATH_DEPTH: usize = 4;

/// Probes the storage by actually using it.
///
/// Writes and reads back a probe file, creates a file with a 96-character
/// `.c9r` name, then nests four directories of that name. Everything lives under
/// [`PROBE_DIR`], which is deleted whatever the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbingCapabilityCheck;

impl ProbingCapabilityCheck {
    fn long_name() -> String {
        format!("{}{CIPHERTEXT_SUFFIX}", "A".repeat(LONG_NAME_STEM_LEN))
    }

    fn probe<S: Storage>(storage: &S, dir: &RelativePath) -> Result<(), MissingCapability> {
        storage
            .create_dir_all(dir)
            .map_err(|e| MissingCapability::new(Capability::Write, e))?;

        let probe = dir.join(PROBE_FILE);
        storage
            .write_new(&probe, PROBE_CONTENT)
            .map_err(|e| MissingCapability::new(Capability::Write, e))?;
        let read_back = storage
            .read_to_vec(&probe)
            .map_err(|e| MissingCapability::new(Capability::Read, e))?;
        if read_back != PROBE_CONTENT {
            return Err(MissingCapability {
                capability: Capability::Read,
                source: None,
            });
        }

        let long_name = Self::long_name();
        storage
            .create_file(&dir.join(&long_name))
            .map_err(|e| MissingCapability::new(Capability::LongFilenames, e))?;

        let mut nested: RelativePathBuf = dir.join(NESTING_DIR);
        storage
            .create_dir(&nested)
            .map_err(|e| MissingCapability::new(Capability::Write, e))?;
        for _ in 0..LONG_PATH_DEPTH {
            nested.push(&long_name);
            storage
                .create_dir(&nested)
                .map_err(|e| MissingCapability::new(Capability::LongPaths, e))?;
        }
        Ok(())
    }
}

impl<S: Storage> CapabilityCheck<S> for ProbingCapabilityCheck {
    fn check(&self, storage: &S) -> Result<(), MissingCapability> {
        let dir = RelativePath::new(PROBE_DIR);
        let result = Self::probe(storage, dir);

        match storage.delete(dir) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(error = %e, "Failed to remove capability probe directory"),
        }

        match &result {
            Ok(()) => debug!(storage = storage.name(), "All storage capabilities present"),
            Err(e) => warn!(storage = storage.name(), capability = %e.capability, "Storage capability missing"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn local_storage_has_every_capability() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path()).unwrap();

        ProbingCapabilityCheck.check(&storage).unwrap();
        assert!(!temp.path().join(PROBE_DIR).exists());
    }

    #[test]
    fn long_name_has_expected_length() {
        assert_eq!(ProbingCapabilityCheck::long_name().len(), 100);
    }

    #[test]
    fn display_names() {
        assert_eq!(Capability::LongFilenames.to_string(), "long filenames");
        let err = MissingCapability {
            capability: Capability::Read,
            source: None,
        };
        assert_eq!(err.to_string(), "Storage lacks the read capability");
    }
}
