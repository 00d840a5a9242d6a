//! Local filesystem storage rooted at a vault container directory.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use relative_path::{Component, RelativePath};
use tracing::trace;

use super::{EntryKind, Storage, StorageEntry, StorageError, WriteMode};

/// [`Storage`] over `std::fs`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Use `root` as the container. The directory must already exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::NotADirectory {
                path: root.display().to_string(),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path under the root, refusing anything that climbs out.
    fn to_fs_path(&self, path: &RelativePath) -> Result<PathBuf, StorageError> {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(name) => fs_path.push(name),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(StorageError::InvalidPath {
                        path: path.as_str().to_string(),
                        reason: "parent components are not allowed".to_string(),
                    });
                }
            }
        }
        Ok(fs_path)
    }

    fn to_entry(name: String, meta: &fs::Metadata) -> StorageEntry {
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        StorageEntry {
            name,
            kind,
            len: if meta.is_file() { meta.len() } else { 0 },
        }
    }
}

impl Storage for LocalStorage {
    type Reader = File;
    type Writer = File;

    fn name(&self) -> &str {
        "local"
    }

    fn entry(&self, path: &RelativePath) -> Result<Option<StorageEntry>, StorageError> {
        let fs_path = self.to_fs_path(path)?;
        match fs::metadata(&fs_path) {
            Ok(meta) => {
                let name = path.file_name().unwrap_or_default().to_string();
                Ok(Some(Self::to_entry(name, &meta)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn list(&self, dir: &RelativePath) -> Result<Vec<StorageEntry>, StorageError> {
        let fs_path = self.to_fs_path(dir)?;
        if !fs_path.is_dir() {
            return match fs_path.exists() {
                true => Err(StorageError::NotADirectory {
                    path: dir.as_str().to_string(),
                }),
                false => Err(StorageError::NotFound {
                    path: dir.as_str().to_string(),
                }),
            };
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&fs_path).map_err(|e| StorageError::io(dir, e))? {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                trace!(dir = %dir, "Skipping non-UTF-8 entry");
                continue;
            };
            let meta = entry.metadata().map_err(|e| StorageError::io(dir, e))?;
            entries.push(Self::to_entry(name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_file(&self, path: &RelativePath) -> Result<(), StorageError> {
        let fs_path = self.to_fs_path(path)?;
        trace!(path = %path, "create_file");
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&fs_path)
            .map(drop)
            .map_err(|e| StorageError::io(path, e))
    }

    fn create_dir(&self, path: &RelativePath) -> Result<(), StorageError> {
        let fs_path = self.to_fs_path(path)?;
        trace!(path = %path, "create_dir");
        fs::create_dir(&fs_path).map_err(|e| StorageError::io(path, e))
    }

    fn delete(&self, path: &RelativePath) -> Result<(), StorageError> {
        let fs_path = self.to_fs_path(path)?;
        trace!(path = %path, "delete");
        let meta = fs::symlink_metadata(&fs_path).map_err(|e| StorageError::io(path, e))?;
        if meta.is_dir() {
            fs::remove_dir_all(&fs_path)
        } else {
            fs::remove_file(&fs_path)
        }
        .map_err(|e| StorageError::io(path, e))
    }

    fn clear_dir(&self, dir: &RelativePath) -> Result<(), StorageError> {
        let fs_path = self.to_fs_path(dir)?;
        trace!(dir = %dir, "clear_dir");
        for entry in fs::read_dir(&fs_path).map_err(|e| StorageError::io(dir, e))? {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            let file_type = entry.file_type().map_err(|e| StorageError::io(dir, e))?;
            if file_type.is_dir() {
                fs::remove_dir_all(entry.path())
            } else {
                fs::remove_file(entry.path())
            }
            .map_err(|e| StorageError::io(dir, e))?;
        }
        Ok(())
    }

    fn rename(&self, from: &RelativePath, to: &RelativePath) -> Result<(), StorageError> {
        let from_path = self.to_fs_path(from)?;
        let to_path = self.to_fs_path(to)?;
        trace!(from = %from, to = %to, "rename");
        fs::rename(&from_path, &to_path).map_err(|e| StorageError::io(from, e))
    }

    fn open_read(&self, path: &RelativePath) -> Result<File, StorageError> {
        let fs_path = self.to_fs_path(path)?;
        File::open(&fs_path).map_err(|e| StorageError::io(path, e))
    }

    fn open_write(&self, path: &RelativePath, mode: WriteMode) -> Result<File, StorageError> {
        let fs_path = self.to_fs_path(path)?;
        let mut options = OpenOptions::new();
        options.write(true);
        match mode {
            WriteMode::Truncate => options.create(true).truncate(true),
            WriteMode::RandomAccess => options.read(true),
        };
        options.open(&fs_path).map_err(|e| StorageError::io(path, e))
    }

    fn sync(&self, writer: &mut File) -> Result<(), StorageError> {
        writer.sync_all().map_err(|e| StorageError::Io {
            path: "<open file>".to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use super::*;
    use relative_path::RelativePathBuf;
    use tempfile::TempDir;

    fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn create_and_find_children() {
        let (_dir, storage) = storage();
        storage.create_dir_all(RelativePath::new("d/AB/CDEF")).unwrap();
        storage.write_new(RelativePath::new("d/AB/CDEF/x.c9r"), b"abc").unwrap();

        let child = storage
            .find_child(RelativePath::new("d/AB/CDEF"), "x.c9r")
            .unwrap()
            .unwrap();
        assert!(child.is_file());
        assert_eq!(child.len, 3);
        assert!(storage.find_child(RelativePath::new("d"), "nope").unwrap().is_none());
    }

    #[test]
    fn create_file_refuses_existing() {
        let (_dir, storage) = storage();
        storage.create_file(RelativePath::new("a")).unwrap();
        assert!(matches!(
            storage.create_file(RelativePath::new("a")),
            Err(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn random_access_write_keeps_content() {
        let (_dir, storage) = storage();
        let path = RelativePathBuf::from("f");
        storage.write_new(&path, b"0123456789").unwrap();

        let mut writer = storage.open_write(&path, WriteMode::RandomAccess).unwrap();
        writer.seek(SeekFrom::Start(4)).unwrap();
        writer.write_all(b"xy").unwrap();
        storage.sync(&mut writer).unwrap();

        let mut content = String::new();
        storage.open_read(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "0123xy6789");
    }

    #[test]
    fn delete_is_recursive_and_rename_replaces() {
        let (_dir, storage) = storage();
        storage.create_dir_all(RelativePath::new("a/b/c")).unwrap();
        storage.delete(RelativePath::new("a")).unwrap();
        assert!(storage.entry(RelativePath::new("a")).unwrap().is_none());

        storage.write_new(RelativePath::new("old"), b"old").unwrap();
        storage.write_new(RelativePath::new("new.tmp"), b"new").unwrap();
        storage
            .rename(RelativePath::new("new.tmp"), RelativePath::new("old"))
            .unwrap();
        assert_eq!(storage.read_to_vec(RelativePath::new("old")).unwrap(), b"new");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn clear_dir_removes_entries_list_skips() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, storage) = storage();
        let odd = dir.path().join(OsStr::from_bytes(b"bad\xff-name"));
        std::fs::write(&odd, b"x").unwrap();
        storage.create_dir_all(RelativePath::new("d/AB")).unwrap();
        assert_eq!(storage.list(RelativePath::new("")).unwrap().len(), 1);

        storage.clear_dir(RelativePath::new("")).unwrap();
        assert!(!odd.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn parent_components_are_rejected() {
        let (_dir, storage) = storage();
        assert!(matches!(
            storage.entry(RelativePath::new("../escape")),
            Err(StorageError::InvalidPath { .. })
        ));
    }
}
