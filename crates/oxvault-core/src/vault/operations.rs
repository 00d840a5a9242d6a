//! Path resolution and entry-level vault operations.
//!
//! [`VaultAccess`] maps cleartext paths onto the sharded ciphertext layout:
//!
//! ```text
//! d/<hash(dirId)[0:2]>/<hash(dirId)[2:]>/
//!     <encrypt(name, dirId)>.c9r          file container (ciphertext)
//!     <encrypt(name, dirId)>.c9r/dir.c9r  directory container + child ID
//! ```
//!
//! # Observability
//!
//! Public operations carry `tracing` spans; key material and file contents
//! are never recorded.

use std::fmt;
use std::sync::Arc;

use relative_path::{RelativePath, RelativePathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::crypto::Cryptor;
use crate::fs::alternative::candidate_names;
use crate::fs::content::{AccessMode, ChunkedFile, ContentConfig, ContentError};
use crate::fs::name::{NameContext, NameError, abbreviate};
use crate::storage::{Storage, StorageEntry, StorageError};

use super::cache::{CacheStats, NameCacheConfig, NameCodec};
use super::config::{
    CIPHERTEXT_SUFFIX, DIR_MARKER_FILE, SHORTENED_SUFFIX, SYMLINK_MARKER_FILE, VaultFlags,
};
use super::path::{DirId, VaultPath, container_path, dir_marker_path, shard_path};

/// Context for vault operations, providing debugging information.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// The cleartext path being operated on
    pub path: Option<String>,
    /// The ciphertext container, relative to the vault root
    pub container: Option<String>,
    /// The directory ID the operation is working in
    pub dir_id: Option<String>,
}

impl OpContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_path(mut self, path: impl fmt::Display) -> Self {
        self.path = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: &RelativePath) -> Self {
        self.container = Some(container.as_str().to_owned());
        self
    }

    #[must_use]
    pub fn with_dir_id(mut self, dir_id: &DirId) -> Self {
        self.dir_id = Some(dir_id.to_string());
        self
    }
}

impl fmt::Display for OpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(ref path) = self.path {
            parts.push(format!("path '{path}'"));
        }
        if let Some(ref dir_id) = self.dir_id {
            let display_id = abbreviate(dir_id, 12, 12);
            parts.push(format!("in directory {display_id}"));
        }
        if let Some(ref container) = self.container {
            parts.push(format!("at '{container}'"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Error, Debug)]
pub enum VaultOperationError {
    #[error("Not found: {context}")]
    NotFound { context: OpContext },

    /// **[CORRUPT VAULT]** A directory container without its marker file.
    #[error("[CORRUPT VAULT] Directory marker missing for {context}")]
    MissingDirectoryMarker { context: OpContext },

    /// **[CORRUPT VAULT]** The marker file is oversized or not an ASCII ID.
    #[error("[CORRUPT VAULT] Invalid directory marker for {context}: {reason}")]
    InvalidDirectoryMarker { reason: String, context: OpContext },

    /// **[CORRUPT VAULT]** A directory whose shard directory is gone.
    #[error("[CORRUPT VAULT] Shard directory missing for {context}")]
    MissingShard { context: OpContext },

    #[error("Not a directory: {context}")]
    NotADirectory { context: OpContext },

    #[error("Not a file: {context}")]
    NotAFile { context: OpContext },

    #[error("Entry already exists: {context}")]
    EntryAlreadyExists { context: OpContext },

    #[error("Vault is read-only: {context}")]
    ReadOnly { context: OpContext },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("The vault root cannot be {operation}")]
    RootOperation { operation: &'static str },

    #[error("Filename error: {0}")]
    Name(#[from] NameError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),
}

/// A listing child that could not be turned into a [`CipherEntry`].
#[derive(Error, Debug)]
#[error("Unreadable entry '{container}': {source}")]
pub struct EntryError {
    pub container: RelativePathBuf,
    #[source]
    pub source: VaultOperationError,
}

/// Kind of a vault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    /// Recognised but not readable
    Symlink,
}

/// One cleartext path segment and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEntry {
    pub path: VaultPath,
    pub kind: EntryType,
    /// Container (or, for the root, its shard directory)
    pub container: RelativePathBuf,
    pub parent_dir_id: DirId,
    /// Own directory ID, for directories
    pub dir_id: Option<DirId>,
}

impl CipherEntry {
    /// Cleartext name; empty for the root.
    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or_default()
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryType::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryType::Directory
    }
}

/// What [`VaultAccess::create_unique`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewEntry {
    File,
    Directory,
}

/// Statistics returned from recursive delete operations
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteStats {
    pub files_deleted: usize,
    pub directories_deleted: usize,
}

/// Entry operations on one unlocked vault.
///
/// The cryptor comes from an unlocked vault handle; storage is rooted at the
/// vault container.
pub struct VaultAccess<C: Cryptor, S: Storage> {
    codec: NameCodec<C>,
    storage: S,
    flags: VaultFlags,
    content: ContentConfig,
}

impl<C: Cryptor, S: Storage> fmt::Debug for VaultAccess<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultAccess")
            .field("storage", &self.storage.name())
            .field("flags", &self.flags)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl<C: Cryptor, S: Storage> VaultAccess<C, S> {
    pub fn new(cryptor: Arc<C>, storage: S) -> Self {
        Self::with_cache_config(cryptor, storage, NameCacheConfig::default())
    }

    pub fn with_cache_config(cryptor: Arc<C>, storage: S, config: NameCacheConfig) -> Self {
        Self {
            codec: NameCodec::with_config(cryptor, config),
            storage,
            flags: VaultFlags::default(),
            content: ContentConfig::default(),
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: VaultFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_content_config(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give up the cryptor and caches, keeping only the storage.
    pub fn into_storage(self) -> S {
        self.codec.clear();
        self.storage
    }

    pub fn flags(&self) -> VaultFlags {
        self.flags
    }

    pub fn codec(&self) -> &NameCodec<C> {
        &self.codec
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.codec.stats()
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Shard directory holding the children of `dir_id`.
    pub fn shard(&self, dir_id: &DirId) -> Result<RelativePathBuf, VaultOperationError> {
        Ok(shard_path(&self.codec.hash_dir_id(dir_id)?))
    }

    /// Walk `path` segment by segment to its ciphertext entry.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn resolve(&self, path: &VaultPath) -> Result<CipherEntry, VaultOperationError> {
        let mut entry = self.root_entry()?;
        for name in path.components() {
            let dir_id = match (entry.kind, entry.dir_id.take()) {
                (EntryType::Directory, Some(dir_id)) => dir_id,
                _ => {
                    return Err(VaultOperationError::NotADirectory {
                        context: OpContext::new()
                            .with_path(&entry.path)
                            .with_container(&entry.container),
                    });
                }
            };
            let shard = self.shard(&dir_id)?;
            let container = container_path(&shard, &self.codec.encrypt_name(name, &dir_id)?);
            let child_path = entry.path.join(name);
            trace!(segment = name, container = %container, "Resolving segment");

            let Some(stored) = self.storage.entry(&container)? else {
                return Err(VaultOperationError::NotFound {
                    context: OpContext::new()
                        .with_path(&child_path)
                        .with_dir_id(&dir_id)
                        .with_container(&container),
                });
            };
            entry = self.classify(child_path, container, &stored, dir_id)?;
        }
        Ok(entry)
    }

    /// Children of the directory at `path`.
    ///
    /// Entries whose names do not decrypt, or whose containers are damaged,
    /// are reported individually and do not fail the listing.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn list(
        &self,
        path: &VaultPath,
    ) -> Result<Vec<Result<CipherEntry, EntryError>>, VaultOperationError> {
        let dir = self.resolve(path)?;
        let dir_id = self.expect_directory(&dir)?;
        let shard = self.shard(&dir_id)?;

        let children = self.storage.list(&shard).map_err(|e| match e {
            StorageError::NotFound { .. } => VaultOperationError::MissingShard {
                context: OpContext::new()
                    .with_path(&dir.path)
                    .with_dir_id(&dir_id)
                    .with_container(&shard),
            },
            other => other.into(),
        })?;

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let container = shard.join(&child.name);
            if child.name == DIR_MARKER_FILE {
                continue;
            }
            if child.name.ends_with(SHORTENED_SUFFIX) {
                warn!(container = %container, "Shortened name entry is not supported");
                entries.push(Err(EntryError {
                    source: NameError::Unsupported {
                        context: NameContext::new()
                            .with_encrypted_name(&child.name)
                            .with_dir_id(dir_id.as_str()),
                    }
                    .into(),
                    container,
                }));
                continue;
            }
            let Some(encrypted) = child.name.strip_suffix(CIPHERTEXT_SUFFIX) else {
                debug!(name = %child.name, "Skipping non-container entry");
                continue;
            };

            let result = self
                .codec
                .decrypt_name(encrypted, &dir_id)
                .map_err(VaultOperationError::from)
                .and_then(|name| {
                    self.classify(dir.path.join(&name), container.clone(), &child, dir_id.clone())
                });
            match result {
                Ok(entry) => entries.push(Ok(entry)),
                Err(source) => {
                    warn!(container = %container, error = %source, "Corrupt entry in listing");
                    entries.push(Err(EntryError { container, source }));
                }
            }
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Create an empty encrypted file (header only).
    #[instrument(level = "debug", skip(self), fields(parent = %parent))]
    pub fn create_file(
        &self,
        parent: &VaultPath,
        name: &str,
    ) -> Result<CipherEntry, VaultOperationError> {
        let (dir_id, path, container) = self.prepare_child(parent, name)?;
        self.storage
            .create_file(&container)
            .map_err(|e| self.already_exists(e, &path, &container))?;

        let header = ChunkedFile::new(
            self.codec.cryptor().as_ref(),
            &self.storage,
            container.clone(),
            AccessMode::WRITE_TRUNCATE,
            self.content,
        )
        .close();
        if let Err(err) = header {
            self.discard(&container);
            return Err(err.into());
        }

        debug!(container = %container, "Created file");
        Ok(CipherEntry {
            path,
            kind: EntryType::File,
            container,
            parent_dir_id: dir_id,
            dir_id: None,
        })
    }

    /// Create a directory with a fresh directory ID and an empty shard.
    #[instrument(level = "debug", skip(self), fields(parent = %parent))]
    pub fn create_directory(
        &self,
        parent: &VaultPath,
        name: &str,
    ) -> Result<CipherEntry, VaultOperationError> {
        let (parent_dir_id, path, container) = self.prepare_child(parent, name)?;
        self.storage
            .create_dir(&container)
            .map_err(|e| self.already_exists(e, &path, &container))?;

        let dir_id = DirId::generate();
        let populate = || -> Result<(), VaultOperationError> {
            self.storage
                .write_new(&dir_marker_path(&container), dir_id.as_str().as_bytes())?;
            self.storage.create_dir_all(&self.shard(&dir_id)?)?;
            Ok(())
        };
        if let Err(err) = populate() {
            self.discard(&container);
            return Err(err);
        }

        debug!(container = %container, dir_id = %dir_id, "Created directory");
        Ok(CipherEntry {
            path,
            kind: EntryType::Directory,
            container,
            parent_dir_id,
            dir_id: Some(dir_id),
        })
    }

    /// Create `name`, or the first free alternative of it (`name (1).ext`, ...).
    #[instrument(level = "debug", skip(self), fields(parent = %parent))]
    pub fn create_unique(
        &self,
        parent: &VaultPath,
        name: &str,
        kind: NewEntry,
    ) -> Result<CipherEntry, VaultOperationError> {
        validate_name(name)?;
        for candidate in candidate_names(name) {
            let created = match kind {
                NewEntry::File => self.create_file(parent, &candidate),
                NewEntry::Directory => self.create_directory(parent, &candidate),
            };
            match created {
                Err(VaultOperationError::EntryAlreadyExists { .. }) => {
                    trace!(candidate = %candidate, "Name taken, trying next alternative");
                }
                other => return other,
            }
        }
        unreachable!("candidate_names is unbounded")
    }

    // ------------------------------------------------------------------------
    // Rename / delete
    // ------------------------------------------------------------------------

    /// Rename an entry within its parent directory. Directory IDs are kept.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn rename(
        &self,
        path: &VaultPath,
        new_name: &str,
    ) -> Result<CipherEntry, VaultOperationError> {
        self.ensure_writable(path)?;
        validate_name(new_name)?;
        let mut entry = self.resolve(path)?;
        let Some(parent) = entry.path.parent() else {
            return Err(VaultOperationError::RootOperation {
                operation: "renamed",
            });
        };

        let shard = self.shard(&entry.parent_dir_id)?;
        let target = container_path(
            &shard,
            &self.codec.encrypt_name(new_name, &entry.parent_dir_id)?,
        );
        let new_path = parent.join(new_name);
        if target == entry.container {
            return Ok(entry);
        }
        if self.storage.entry(&target)?.is_some() {
            return Err(VaultOperationError::EntryAlreadyExists {
                context: OpContext::new()
                    .with_path(&new_path)
                    .with_container(&target),
            });
        }

        self.storage.rename(&entry.container, &target)?;
        debug!(from = %entry.container, to = %target, "Renamed entry");
        entry.path = new_path;
        entry.container = target;
        Ok(entry)
    }

    /// Delete a file, or a directory with everything below it.
    #[instrument(level = "info", skip(self), fields(path = %path))]
    pub fn delete(&self, path: &VaultPath) -> Result<DeleteStats, VaultOperationError> {
        self.ensure_writable(path)?;
        if path.is_root() {
            return Err(VaultOperationError::RootOperation {
                operation: "deleted",
            });
        }
        let entry = self.resolve(path)?;
        let mut stats = DeleteStats::default();

        if let Some(dir_id) = &entry.dir_id {
            // Collect every directory below, depth-first, without recursion
            let mut pending = vec![dir_id.clone()];
            let mut found = Vec::new();
            while let Some(id) = pending.pop() {
                let shard = self.shard(&id)?;
                let children = match self.storage.list(&shard) {
                    Ok(children) => children,
                    Err(StorageError::NotFound { .. }) => Vec::new(),
                    Err(e) => return Err(e.into()),
                };
                for child in children.iter().filter(|c| c.name.ends_with(CIPHERTEXT_SUFFIX)) {
                    if child.is_dir() {
                        let marker = dir_marker_path(&shard.join(&child.name));
                        if self.storage.entry(&marker)?.is_some() {
                            pending.push(self.read_dir_marker(&marker, &entry.path)?);
                        }
                    } else {
                        stats.files_deleted += 1;
                    }
                }
                found.push((id, shard));
            }

            for (id, shard) in found.iter().rev() {
                trace!(dir_id = %id, shard = %shard, "Removing shard");
                match self.storage.delete(shard) {
                    Ok(()) | Err(StorageError::NotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                self.remove_empty_prefix(shard)?;
                stats.directories_deleted += 1;
            }
        } else {
            stats.files_deleted += 1;
        }

        self.storage.delete(&entry.container)?;
        info!(
            files = stats.files_deleted,
            directories = stats.directories_deleted,
            "Deleted entry"
        );
        Ok(stats)
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    /// Open the file at `path` for content I/O.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn open_file(
        &self,
        path: &VaultPath,
        mode: AccessMode,
    ) -> Result<ChunkedFile<'_, C, S>, VaultOperationError> {
        if mode.write {
            self.ensure_writable(path)?;
        }
        let entry = self.resolve(path)?;
        if entry.kind != EntryType::File {
            return Err(VaultOperationError::NotAFile {
                context: OpContext::new()
                    .with_path(&entry.path)
                    .with_container(&entry.container),
            });
        }
        Ok(ChunkedFile::new(
            self.codec.cryptor().as_ref(),
            &self.storage,
            entry.container,
            mode,
            self.content,
        )
        .with_cleartext_path(path.to_string()))
    }

    /// Cleartext size of the file at `path`.
    pub fn file_size(&self, path: &VaultPath) -> Result<u64, VaultOperationError> {
        Ok(self.open_file(path, AccessMode::READ)?.size()?)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn root_entry(&self) -> Result<CipherEntry, VaultOperationError> {
        let root = DirId::root();
        Ok(CipherEntry {
            path: VaultPath::root(),
            kind: EntryType::Directory,
            container: self.shard(&root)?,
            parent_dir_id: root.clone(),
            dir_id: Some(root),
        })
    }

    /// Decide what a container is by looking at it.
    fn classify(
        &self,
        path: VaultPath,
        container: RelativePathBuf,
        stored: &StorageEntry,
        parent_dir_id: DirId,
    ) -> Result<CipherEntry, VaultOperationError> {
        let (kind, dir_id) = if stored.is_file() {
            (EntryType::File, None)
        } else {
            let marker = dir_marker_path(&container);
            if self.storage.entry(&marker)?.is_some() {
                (EntryType::Directory, Some(self.read_dir_marker(&marker, &path)?))
            } else if self
                .storage
                .find_child(&container, SYMLINK_MARKER_FILE)?
                .is_some()
            {
                (EntryType::Symlink, None)
            } else {
                return Err(VaultOperationError::MissingDirectoryMarker {
                    context: OpContext::new()
                        .with_path(&path)
                        .with_dir_id(&parent_dir_id)
                        .with_container(&container),
                });
            }
        };
        Ok(CipherEntry {
            path,
            kind,
            container,
            parent_dir_id,
            dir_id,
        })
    }

    fn read_dir_marker(
        &self,
        marker: &RelativePath,
        path: &VaultPath,
    ) -> Result<DirId, VaultOperationError> {
        let invalid = |reason: String| VaultOperationError::InvalidDirectoryMarker {
            reason,
            context: OpContext::new().with_path(path).with_container(marker),
        };
        let bytes = self.storage.read_to_vec(marker)?;
        let limit = self.codec.cryptor().max_dir_marker_length();
        if bytes.len() > limit {
            return Err(invalid(format!("{} bytes exceeds {limit}", bytes.len())));
        }
        let id = String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
        // Directory IDs are UUIDs; anything else was not written by this format
        if !id.is_ascii() {
            return Err(invalid("directory ID is not ASCII".to_string()));
        }
        Ok(DirId::from_raw(id))
    }

    fn expect_directory(&self, entry: &CipherEntry) -> Result<DirId, VaultOperationError> {
        match (&entry.kind, &entry.dir_id) {
            (EntryType::Directory, Some(dir_id)) => Ok(dir_id.clone()),
            _ => Err(VaultOperationError::NotADirectory {
                context: OpContext::new()
                    .with_path(&entry.path)
                    .with_container(&entry.container),
            }),
        }
    }

    /// Validate and locate a new child of `parent`.
    fn prepare_child(
        &self,
        parent: &VaultPath,
        name: &str,
    ) -> Result<(DirId, VaultPath, RelativePathBuf), VaultOperationError> {
        let path = parent.join(name);
        self.ensure_writable(&path)?;
        validate_name(name)?;
        let dir_id = self.expect_directory(&self.resolve(parent)?)?;
        let shard = self.shard(&dir_id)?;
        let container = container_path(&shard, &self.codec.encrypt_name(name, &dir_id)?);
        Ok((dir_id, path, container))
    }

    fn ensure_writable(&self, path: &VaultPath) -> Result<(), VaultOperationError> {
        if self.flags.read_only {
            return Err(VaultOperationError::ReadOnly {
                context: OpContext::new().with_path(path),
            });
        }
        Ok(())
    }

    fn already_exists(
        &self,
        err: StorageError,
        path: &VaultPath,
        container: &RelativePath,
    ) -> VaultOperationError {
        match err {
            StorageError::AlreadyExists { .. } => VaultOperationError::EntryAlreadyExists {
                context: OpContext::new().with_path(path).with_container(container),
            },
            other => other.into(),
        }
    }

    /// Best-effort removal of a half-created container.
    fn discard(&self, container: &RelativePath) {
        if let Err(e) = self.storage.delete(container) {
            warn!(container = %container, error = %e, "Failed to clean up partial entry");
        }
    }

    /// Remove the two-character prefix directory above `shard` once empty.
    fn remove_empty_prefix(&self, shard: &RelativePath) -> Result<(), VaultOperationError> {
        let Some(prefix) = shard.parent() else {
            return Ok(());
        };
        match self.storage.list(prefix) {
            Ok(children) if children.is_empty() => {
                trace!(prefix = %prefix, "Removing empty prefix directory");
                self.storage.delete(prefix)?;
            }
            Ok(_) | Err(StorageError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Reject names that cannot be a single path segment.
fn validate_name(name: &str) -> Result<(), VaultOperationError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is a relative path component"
    } else if name.contains('/') || name.contains('\\') {
        "name contains a path separator"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(VaultOperationError::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display_keeps_char_boundaries() {
        let ctx = OpContext::new()
            .with_path("docs")
            .with_dir_id(&DirId::from_raw("a\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}"));
        assert_eq!(
            ctx.to_string(),
            "path 'docs', in directory a\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}"
        );

        let long = OpContext::new().with_dir_id(&DirId::from_raw("\u{e9}".repeat(20)));
        assert_eq!(long.to_string(), format!("in directory {}...", "\u{e9}".repeat(12)));
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("report.txt").is_ok());
        assert!(validate_name(".hidden").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(validate_name(bad), Err(VaultOperationError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn context_display() {
        let ctx = OpContext::new()
            .with_path(VaultPath::new("docs/a.txt"))
            .with_dir_id(&DirId::from_raw("e9250eb8-078d-4fc0-8835-be92a313360c"))
            .with_container(RelativePath::new("d/AB/CD/x.c9r"));
        assert_eq!(
            ctx.to_string(),
            "path '/docs/a.txt', in directory e9250eb8-078..., at 'd/AB/CD/x.c9r'"
        );
        assert_eq!(OpContext::new().to_string(), "(no context)");
    }
}
