//! Type-safe path handling for vaults.
//!
//! Three path spaces meet in the vault engine and are kept apart by type:
//! - `DirId`: opaque directory identifiers (UUID text, root is empty)
//! - `VaultPath`: cleartext paths the user sees (e.g. "/Documents/file.txt")
//! - `RelativePathBuf`: ciphertext locations relative to the vault container

use relative_path::{RelativePath, RelativePathBuf};
use std::fmt;
use uuid::Uuid;

use super::config::{CIPHERTEXT_SUFFIX, DATA_DIR_NAME, DIR_MARKER_FILE};

/// Opaque directory identifier.
///
/// Directory IDs are stored in `dir.c9r` marker files and used as associated
/// data for filename encryption, binding each name to its parent directory.
///
/// # Examples
///
/// ```
/// use oxvault_core::vault::path::DirId;
///
/// let root = DirId::root();
/// assert!(root.is_root());
///
/// let dir_id = DirId::from_raw("550e8400-e29b-41d4-a716-446655440000");
/// assert!(!dir_id.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirId(String);

impl DirId {
    /// The root directory (empty string ID).
    #[inline]
    pub fn root() -> Self {
        DirId(String::new())
    }

    /// A fresh random ID for a new directory.
    pub fn generate() -> Self {
        DirId(Uuid::new_v4().to_string())
    }

    /// Wrap an ID read from a marker file.
    #[inline]
    pub fn from_raw(id: impl Into<String>) -> Self {
        DirId(id.into())
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DirId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Cleartext path within a vault.
///
/// Vault paths use `/` as the separator regardless of the host OS.
///
/// # Examples
///
/// ```
/// use oxvault_core::vault::path::VaultPath;
///
/// let path = VaultPath::new("/Documents/report.txt");
/// assert_eq!(path.file_name(), Some("report.txt"));
/// assert_eq!(path.parent().unwrap().as_str(), "Documents");
/// assert_eq!(path, VaultPath::new("Documents/report.txt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultPath(RelativePathBuf);

impl VaultPath {
    #[inline]
    pub fn root() -> Self {
        VaultPath(RelativePathBuf::new())
    }

    /// Leading and trailing slashes are stripped.
    pub fn new(path: impl AsRef<str>) -> Self {
        let s = path.as_ref().trim_matches('/');
        VaultPath(RelativePathBuf::from(s))
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_str().is_empty()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn join(&self, component: impl AsRef<str>) -> Self {
        VaultPath(self.0.join(component.as_ref()))
    }

    /// `None` for the root path.
    pub fn parent(&self) -> Option<VaultPath> {
        self.0.parent().map(|p| VaultPath(p.to_relative_path_buf()))
    }

    /// `None` for the root path.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Segment names, root first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.components().map(|c| c.as_str())
    }

    /// Split into parent path and final name. `None` for the root path.
    ///
    /// ```
    /// use oxvault_core::vault::path::VaultPath;
    ///
    /// let path = VaultPath::new("Documents/report.txt");
    /// let (parent, name) = path.split().unwrap();
    /// assert_eq!(parent.as_str(), "Documents");
    /// assert_eq!(name, "report.txt");
    /// ```
    pub fn split(&self) -> Option<(VaultPath, &str)> {
        let parent = self.parent()?;
        let name = self.file_name()?;
        Some((parent, name))
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.0)
        }
    }
}

impl From<&str> for VaultPath {
    fn from(s: &str) -> Self {
        VaultPath::new(s)
    }
}

impl From<String> for VaultPath {
    fn from(s: String) -> Self {
        VaultPath::new(s)
    }
}

/// Shard directory for a hashed directory ID: `d/{hash[0:2]}/{hash[2:]}`.
pub fn shard_path(dir_id_hash: &str) -> RelativePathBuf {
    let (prefix, rest) = dir_id_hash.split_at(2.min(dir_id_hash.len()));
    RelativePath::new(DATA_DIR_NAME).join(prefix).join(rest)
}

/// Container path for an encrypted name inside a shard directory.
pub fn container_path(shard: &RelativePath, encrypted_name: &str) -> RelativePathBuf {
    shard.join(format!("{encrypted_name}{CIPHERTEXT_SUFFIX}"))
}

/// Marker file inside a directory container.
pub fn dir_marker_path(container: &RelativePath) -> RelativePathBuf {
    container.join(DIR_MARKER_FILE)
}
