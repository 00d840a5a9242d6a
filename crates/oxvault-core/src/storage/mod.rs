//! Host storage abstraction.
//!
//! The vault engine never touches a filesystem directly. Everything it stores
//! (key file, shard directories, containers, marker files, ciphertext) goes
//! through a [`Storage`] implementation addressed by paths relative to the
//! vault container.

mod local;

use std::io::{self, Read, Seek, Write};

use relative_path::RelativePath;
use thiserror::Error;

pub use local::LocalStorage;

/// Kind of a storage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Byte length for files, 0 for directories
    pub len: u64,
}

impl StorageEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// How [`Storage::open_write`] treats existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create the file if missing and discard its content.
    Truncate,
    /// Open an existing file for positioned writes; content is kept.
    RandomAccess,
}

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage entry not found: '{path}'")]
    NotFound { path: String },

    #[error("Storage entry already exists: '{path}'")]
    AlreadyExists { path: String },

    #[error("Storage entry is not a directory: '{path}'")]
    NotADirectory { path: String },

    #[error("Invalid storage path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify an `io::Error` raised while touching `path`.
    pub fn io(path: &RelativePath, source: io::Error) -> Self {
        let path = path.as_str().to_string();
        match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound { path },
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists { path },
            _ => StorageError::Io { path, source },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Synchronous hierarchical storage.
///
/// Calls block; retries, if any, are the implementation's business.
pub trait Storage: Send + Sync {
    type Reader: Read + Seek + Send;
    type Writer: Write + Seek + Send;

    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Look up a single path. `Ok(None)` when nothing exists there.
    fn entry(&self, path: &RelativePath) -> Result<Option<StorageEntry>, StorageError>;

    /// Look up `name` inside `dir`.
    fn find_child(
        &self,
        dir: &RelativePath,
        name: &str,
    ) -> Result<Option<StorageEntry>, StorageError> {
        self.entry(&dir.join(name))
    }

    /// Children of a directory, sorted by name.
    fn list(&self, dir: &RelativePath) -> Result<Vec<StorageEntry>, StorageError>;

    /// Create an empty file; fails with `AlreadyExists` if anything is there.
    fn create_file(&self, path: &RelativePath) -> Result<(), StorageError>;

    /// Create a single directory; the parent must exist.
    fn create_dir(&self, path: &RelativePath) -> Result<(), StorageError>;

    /// Create a directory and any missing ancestors.
    fn create_dir_all(&self, path: &RelativePath) -> Result<(), StorageError> {
        let mut current = relative_path::RelativePathBuf::new();
        for component in path.components() {
            current.push(component.as_str());
            match self.entry(&current)? {
                Some(entry) if entry.is_dir() => {}
                Some(_) => {
                    return Err(StorageError::NotADirectory {
                        path: current.into_string(),
                    });
                }
                None => self.create_dir(&current)?,
            }
        }
        Ok(())
    }

    /// Remove a file, or a directory with everything below it.
    fn delete(&self, path: &RelativePath) -> Result<(), StorageError>;

    /// Remove every child of `dir`, including ones `list` cannot name.
    fn clear_dir(&self, dir: &RelativePath) -> Result<(), StorageError> {
        for child in self.list(dir)? {
            self.delete(&dir.join(&child.name))?;
        }
        Ok(())
    }

    /// Move `from` to `to`, replacing an existing file at `to`.
    fn rename(&self, from: &RelativePath, to: &RelativePath) -> Result<(), StorageError>;

    fn open_read(&self, path: &RelativePath) -> Result<Self::Reader, StorageError>;

    fn open_write(&self, path: &RelativePath, mode: WriteMode)
    -> Result<Self::Writer, StorageError>;

    /// Flush a writer through to durable storage.
    fn sync(&self, writer: &mut Self::Writer) -> Result<(), StorageError>;

    /// Read a whole (small) file.
    fn read_to_vec(&self, path: &RelativePath) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.open_read(path)?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| StorageError::io(path, e))?;
        Ok(buf)
    }

    /// Create a new file with the given content; fails if it already exists.
    fn write_new(&self, path: &RelativePath, data: &[u8]) -> Result<(), StorageError> {
        self.create_file(path)?;
        let mut writer = self.open_write(path, WriteMode::RandomAccess)?;
        writer.write_all(data).map_err(|e| StorageError::io(path, e))?;
        self.sync(&mut writer)
    }
}
