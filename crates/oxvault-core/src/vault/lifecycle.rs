//! Vault creation, unlocking and passphrase changes.
//!
//! A vault is either [`LockedVault`] (storage plus the settings needed to
//! unlock it) or [`UnlockedVault`] (additionally holding the cryptor).
//! Unlocking consumes the locked handle and locking consumes the unlocked
//! one, so key material never outlives the handle that owns it.
//!
//! Passphrases are taken as caller-owned `&mut [u8]` and wiped before every
//! function here returns, whether it succeeded or not.
//!
//! # Example
//!
//! ```no_run
//! use oxvault_core::storage::LocalStorage;
//! use oxvault_core::vault::{LockedVault, VaultCreator, VaultPath};
//!
//! let storage = LocalStorage::new("/path/to/container")?;
//! let mut passphrase = b"correct horse".to_vec();
//! let vault = VaultCreator::new(storage, "masterkey.cryptomator").create(&mut passphrase)?;
//! assert!(passphrase.iter().all(|&b| b == 0));
//!
//! let locked: LockedVault<LocalStorage> = vault.lock();
//! let mut passphrase = b"correct horse".to_vec();
//! let vault = locked.unlock(&mut passphrase)?;
//! assert!(vault.access().list(&VaultPath::root())?.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::sync::Arc;

use relative_path::{RelativePath, RelativePathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroize;

use crate::crypto::{CryptoError, Cryptor, KeyAccessError, MasterKey, SivCtrMacCryptor};
use crate::fs::name::NameError;
use crate::storage::{LocalStorage, Storage, StorageError};

use super::capability::{CapabilityCheck, MissingCapability, ProbingCapabilityCheck};
use super::config::{
    DATA_DIR_NAME, KEY_FILE_BACKUP_SUFFIX, ROTATION_TEMP_SUFFIX, VAULT_VERSION, Vault, VaultFlags,
};
use super::master_key::{KdfConfig, MasterKeyFile};
use super::operations::VaultAccess;
use super::path::shard_path;

/// Errors from vault lifecycle operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Key file '{key_file}' not found")]
    KeyFileNotFound { key_file: String },

    /// Key unwrap did not authenticate: wrong passphrase or pepper.
    #[error("Invalid passphrase")]
    InvalidPassphrase,

    /// Version field unsupported, or **[INTEGRITY VIOLATION]** its MAC did
    /// not verify.
    #[error("Unsupported vault format (version {version}): {reason}")]
    UnsupportedVaultFormat { version: u32, reason: &'static str },

    #[error(transparent)]
    CapabilityMissing(#[from] MissingCapability),

    #[error("Malformed key file '{key_file}': {source}")]
    MalformedKeyFile {
        key_file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Passphrase is not valid UTF-8")]
    PassphraseEncoding,

    /// Something appeared where creation expected nothing.
    #[error("'{path}' already exists in the vault container")]
    ChildAlreadyExists { path: String },

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Name error: {0}")]
    Name(#[from] NameError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Key access error: {0}")]
    KeyAccess(#[from] KeyAccessError),
}

/// Zeroes a caller's passphrase buffer when dropped.
struct Passphrase<'a>(&'a mut [u8]);

impl Passphrase<'_> {
    fn as_str(&self) -> Result<&str, VaultError> {
        std::str::from_utf8(&self.0[..]).map_err(|_| VaultError::PassphraseEncoding)
    }
}

impl Drop for Passphrase<'_> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// True when `key_file_name` is a file and the data root is a directory.
pub fn contains_vault<S: Storage>(storage: &S, key_file_name: &str) -> Result<bool, StorageError> {
    let key_file = storage.entry(RelativePath::new(key_file_name))?;
    let data_root = storage.entry(RelativePath::new(DATA_DIR_NAME))?;
    Ok(matches!(key_file, Some(e) if e.is_file()) && matches!(data_root, Some(e) if e.is_dir()))
}

fn read_key_bytes<S: Storage>(storage: &S, key_file_name: &str) -> Result<Vec<u8>, VaultError> {
    storage
        .read_to_vec(RelativePath::new(key_file_name))
        .map_err(|e| match e {
            StorageError::NotFound { .. } => VaultError::KeyFileNotFound {
                key_file: key_file_name.to_string(),
            },
            other => other.into(),
        })
}

/// Parse a key file and reject versions other than 7.
fn parse_key_file(bytes: &[u8], key_file_name: &str) -> Result<MasterKeyFile, VaultError> {
    let key_file = MasterKeyFile::from_json(bytes).map_err(|source| VaultError::MalformedKeyFile {
        key_file: key_file_name.to_string(),
        source,
    })?;
    if key_file.version != VAULT_VERSION {
        return Err(VaultError::UnsupportedVaultFormat {
            version: key_file.version,
            reason: "only version 7 is supported",
        });
    }
    Ok(key_file)
}

fn unlock_key_file(
    key_file: &MasterKeyFile,
    passphrase: &str,
    pepper: &[u8],
) -> Result<MasterKey, VaultError> {
    key_file
        .unlock(passphrase, pepper)
        .map_err(|e| unlock_error(e, key_file.version))
}

fn unlock_error(err: CryptoError, version: u32) -> VaultError {
    match err {
        CryptoError::KeyUnwrapIntegrityFailed => VaultError::InvalidPassphrase,
        CryptoError::HmacVerificationFailed => VaultError::UnsupportedVaultFormat {
            version,
            reason: "version MAC does not match",
        },
        other => VaultError::Crypto(other),
    }
}

/// Builder for new vaults.
///
/// Creation is destructive: every existing child of the container is
/// removed before the capability checks run.
pub struct VaultCreator<S: Storage> {
    storage: S,
    key_file_name: String,
    pepper: Vec<u8>,
    kdf: KdfConfig,
    flags: VaultFlags,
    capability_check: Box<dyn CapabilityCheck<S>>,
}

impl<S: Storage> fmt::Debug for VaultCreator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultCreator")
            .field("storage", &self.storage.name())
            .field("key_file_name", &self.key_file_name)
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}

impl<S: Storage> VaultCreator<S> {
    pub fn new(storage: S, key_file_name: impl Into<String>) -> Self {
        Self {
            storage,
            key_file_name: key_file_name.into(),
            pepper: Vec::new(),
            kdf: KdfConfig::default(),
            flags: VaultFlags::default(),
            capability_check: Box::new(ProbingCapabilityCheck),
        }
    }

    #[must_use]
    pub fn with_pepper(mut self, pepper: impl Into<Vec<u8>>) -> Self {
        self.pepper = pepper.into();
        self
    }

    #[must_use]
    pub fn with_kdf(mut self, kdf: KdfConfig) -> Self {
        self.kdf = kdf;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: VaultFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replace the default [`ProbingCapabilityCheck`].
    #[must_use]
    pub fn with_capability_check(mut self, check: impl CapabilityCheck<S> + 'static) -> Self {
        self.capability_check = Box::new(check);
        self
    }

    /// Create the vault and return it unlocked.
    ///
    /// This will:
    /// 1. Delete every existing child of the container
    /// 2. Run the capability check
    /// 3. Generate fresh master keys and write the key file (create-new)
    /// 4. Create the root directory's shard
    ///
    /// # Errors
    /// * `VaultError::CapabilityMissing` before any key material is written
    /// * `VaultError::ChildAlreadyExists` if the key file reappeared after clearing
    /// * `VaultError::PassphraseEncoding` for non-UTF-8 passphrases
    #[instrument(level = "debug", skip_all, fields(storage = self.storage.name(), key_file = %self.key_file_name))]
    pub fn create(self, passphrase: &mut [u8]) -> Result<UnlockedVault<S>, VaultError> {
        let guard = Passphrase(passphrase);
        let passphrase = guard.as_str()?;

        debug!("Clearing existing container entries");
        self.storage.clear_dir(RelativePath::new(""))?;

        self.capability_check.check(&self.storage)?;

        let master_key = MasterKey::random()?;
        let key_file = MasterKeyFile::create(&master_key, passphrase, &self.pepper, self.kdf)?;
        let json = key_file.to_json().map_err(|source| VaultError::MalformedKeyFile {
            key_file: self.key_file_name.clone(),
            source,
        })?;
        self.storage
            .write_new(RelativePath::new(&self.key_file_name), json.as_bytes())
            .map_err(|e| match e {
                StorageError::AlreadyExists { path } => VaultError::ChildAlreadyExists { path },
                other => other.into(),
            })?;

        let cryptor = Arc::new(SivCtrMacCryptor::new(Arc::new(master_key)));
        let root_shard = shard_path(&cryptor.hash_directory_id("")?);
        self.storage.create_dir_all(&root_shard)?;

        info!(shard = %root_shard, "Vault created");
        let locked = LockedVault {
            storage: self.storage,
            key_file_name: self.key_file_name,
            pepper: self.pepper,
            flags: self.flags,
        };
        Ok(locked.into_unlocked(cryptor))
    }
}

/// A vault whose key material is not in memory.
#[derive(Debug, Clone)]
pub struct LockedVault<S: Storage> {
    storage: S,
    key_file_name: String,
    pepper: Vec<u8>,
    flags: VaultFlags,
}

impl LockedVault<LocalStorage> {
    /// A locked handle for a registered vault on the local filesystem.
    pub fn from_record(vault: &Vault) -> Result<Self, VaultError> {
        Ok(LockedVault::new(LocalStorage::new(&vault.root)?, &vault.key_file_name)
            .with_pepper(vault.pepper.clone())
            .with_flags(vault.flags))
    }
}

impl<S: Storage> LockedVault<S> {
    pub fn new(storage: S, key_file_name: impl Into<String>) -> Self {
        Self {
            storage,
            key_file_name: key_file_name.into(),
            pepper: Vec::new(),
            flags: VaultFlags::default(),
        }
    }

    #[must_use]
    pub fn with_pepper(mut self, pepper: impl Into<Vec<u8>>) -> Self {
        self.pepper = pepper.into();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: VaultFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn key_file_name(&self) -> &str {
        &self.key_file_name
    }

    pub fn contains_vault(&self) -> Result<bool, StorageError> {
        contains_vault(&self.storage, &self.key_file_name)
    }

    /// Parsed key file, without unwrapping anything.
    pub fn key_file(&self) -> Result<MasterKeyFile, VaultError> {
        let bytes = read_key_bytes(&self.storage, &self.key_file_name)?;
        parse_key_file(&bytes, &self.key_file_name)
    }

    /// Read the key file and unwrap the master keys.
    ///
    /// The version field is checked first, then the passphrase, then the
    /// version MAC.
    ///
    /// # Errors
    /// * `VaultError::KeyFileNotFound` if there is no key file
    /// * `VaultError::InvalidPassphrase` if key unwrap fails
    /// * `VaultError::UnsupportedVaultFormat` for other versions or a bad version MAC
    #[instrument(level = "debug", skip_all, fields(storage = self.storage.name(), key_file = %self.key_file_name))]
    pub fn unlock(self, passphrase: &mut [u8]) -> Result<UnlockedVault<S>, VaultError> {
        let passphrase = Passphrase(passphrase);
        let bytes = read_key_bytes(&self.storage, &self.key_file_name)?;
        let key_file = parse_key_file(&bytes, &self.key_file_name)?;
        let master_key = unlock_key_file(&key_file, passphrase.as_str()?, &self.pepper)?;
        drop(passphrase);

        info!("Vault unlocked");
        let cryptor = Arc::new(SivCtrMacCryptor::new(Arc::new(master_key)));
        Ok(self.into_unlocked(cryptor))
    }

    /// Rewrap the master keys under `new_passphrase`.
    ///
    /// The previous key file is kept as `<key file>.bkup`; the new one is
    /// written beside it and renamed into place.
    #[instrument(level = "debug", skip_all, fields(storage = self.storage.name(), key_file = %self.key_file_name))]
    pub fn change_passphrase(
        &self,
        old_passphrase: &mut [u8],
        new_passphrase: &mut [u8],
        kdf: KdfConfig,
    ) -> Result<(), VaultError> {
        let old_passphrase = Passphrase(old_passphrase);
        let new_passphrase = Passphrase(new_passphrase);
        let key_path = RelativePathBuf::from(self.key_file_name.as_str());

        let previous = read_key_bytes(&self.storage, &self.key_file_name)?;
        let key_file = parse_key_file(&previous, &self.key_file_name)?;
        let rewrapped = key_file
            .rewrap(
                old_passphrase.as_str()?,
                new_passphrase.as_str()?,
                &self.pepper,
                kdf,
            )
            .map_err(|e| unlock_error(e, key_file.version))?;
        let json = rewrapped
            .to_json()
            .map_err(|source| VaultError::MalformedKeyFile {
                key_file: self.key_file_name.clone(),
                source,
            })?;

        let backup = RelativePathBuf::from(format!("{}{KEY_FILE_BACKUP_SUFFIX}", self.key_file_name));
        replace_file(&self.storage, &backup, &previous)?;
        replace_file(&self.storage, &key_path, json.as_bytes())?;
        info!(backup = %backup, "Passphrase changed");
        Ok(())
    }

    fn into_unlocked(self, cryptor: Arc<SivCtrMacCryptor>) -> UnlockedVault<S> {
        let access = VaultAccess::new(Arc::clone(&cryptor), self.storage).with_flags(self.flags);
        UnlockedVault {
            access,
            cryptor,
            key_file_name: self.key_file_name,
            pepper: self.pepper,
        }
    }
}

/// Write `data` to a sibling temp file, then rename it over `path`.
fn replace_file<S: Storage>(storage: &S, path: &RelativePath, data: &[u8]) -> Result<(), StorageError> {
    let temp = RelativePathBuf::from(format!("{path}{ROTATION_TEMP_SUFFIX}"));
    if storage.entry(&temp)?.is_some() {
        storage.delete(&temp)?;
    }
    let written = storage
        .write_new(&temp, data)
        .and_then(|()| storage.rename(&temp, path));
    if written.is_err() {
        if let Err(e) = storage.delete(&temp) {
            warn!(path = %temp, error = %e, "Failed to remove temporary key file");
        }
    }
    written
}

/// A vault with its cryptor in memory.
pub struct UnlockedVault<S: Storage> {
    access: VaultAccess<SivCtrMacCryptor, S>,
    cryptor: Arc<SivCtrMacCryptor>,
    key_file_name: String,
    pepper: Vec<u8>,
}

impl<S: Storage> fmt::Debug for UnlockedVault<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedVault")
            .field("access", &self.access)
            .field("key_file_name", &self.key_file_name)
            .finish_non_exhaustive()
    }
}

impl<S: Storage> UnlockedVault<S> {
    /// Entry operations on this vault.
    pub fn access(&self) -> &VaultAccess<SivCtrMacCryptor, S> {
        &self.access
    }

    pub fn cryptor(&self) -> &Arc<SivCtrMacCryptor> {
        &self.cryptor
    }

    pub fn key_file_name(&self) -> &str {
        &self.key_file_name
    }

    /// Drop the cryptor and caches.
    ///
    /// Key material is wiped once no other clone of [`cryptor`](Self::cryptor)
    /// is alive.
    pub fn lock(self) -> LockedVault<S> {
        let flags = self.access.flags();
        let storage = self.access.into_storage();
        if Arc::strong_count(&self.cryptor) > 1 {
            warn!("Locking vault while cryptor handles are still shared");
        }
        drop(self.cryptor);
        debug!("Vault locked");
        LockedVault {
            storage,
            key_file_name: self.key_file_name,
            pepper: self.pepper,
            flags,
        }
    }
}

/// Create a vault with default settings.
pub fn create_vault<S: Storage>(
    storage: S,
    key_file_name: &str,
    passphrase: &mut [u8],
    pepper: &[u8],
) -> Result<UnlockedVault<S>, VaultError> {
    VaultCreator::new(storage, key_file_name)
        .with_pepper(pepper)
        .create(passphrase)
}

/// Unlock an existing vault.
pub fn open_vault<S: Storage>(
    storage: S,
    key_file_name: &str,
    passphrase: &mut [u8],
    pepper: &[u8],
) -> Result<UnlockedVault<S>, VaultError> {
    LockedVault::new(storage, key_file_name)
        .with_pepper(pepper)
        .unlock(passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::config::DEFAULT_KEY_FILE_NAME;
    use crate::vault::path::VaultPath;
    use tempfile::TempDir;

    fn create(temp: &TempDir, passphrase: &str) -> UnlockedVault<LocalStorage> {
        let storage = LocalStorage::new(temp.path()).unwrap();
        let mut passphrase = passphrase.as_bytes().to_vec();
        VaultCreator::new(storage, DEFAULT_KEY_FILE_NAME)
            .with_kdf(KdfConfig::fast())
            .create(&mut passphrase)
            .unwrap()
    }

    #[test]
    fn passphrase_is_wiped_on_success_and_failure() {
        let temp = TempDir::new().unwrap();
        let locked = create(&temp, "secret").lock();

        let mut wrong = b"wrong".to_vec();
        let result = locked.clone().unlock(&mut wrong);
        assert!(matches!(result, Err(VaultError::InvalidPassphrase)));
        assert_eq!(wrong, [0u8; 5]);

        let mut right = b"secret".to_vec();
        locked.unlock(&mut right).unwrap();
        assert_eq!(right, [0u8; 6]);
    }

    #[test]
    fn non_utf8_passphrase_is_rejected() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path()).unwrap();
        let mut passphrase = vec![0xff, 0xfe];
        let result = VaultCreator::new(storage, DEFAULT_KEY_FILE_NAME).create(&mut passphrase);
        assert!(matches!(result, Err(VaultError::PassphraseEncoding)));
        assert_eq!(passphrase, [0, 0]);
    }

    #[test]
    fn missing_key_file() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp.path()).unwrap();
        let result = open_vault(storage, DEFAULT_KEY_FILE_NAME, &mut b"x".to_vec(), &[]);
        assert!(matches!(result, Err(VaultError::KeyFileNotFound { .. })));
    }

    #[test]
    fn unsupported_version_is_checked_before_passphrase() {
        let temp = TempDir::new().unwrap();
        let locked = create(&temp, "secret").lock();

        let path = temp.path().join(DEFAULT_KEY_FILE_NAME);
        let mut key_file = MasterKeyFile::from_json(&std::fs::read(&path).unwrap()).unwrap();
        key_file.version = 8;
        std::fs::write(&path, key_file.to_json().unwrap()).unwrap();

        let result = locked.unlock(&mut b"wrong".to_vec());
        assert!(matches!(
            result,
            Err(VaultError::UnsupportedVaultFormat { version: 8, .. })
        ));
    }

    #[test]
    fn tampered_version_mac() {
        let temp = TempDir::new().unwrap();
        let locked = create(&temp, "secret").lock();

        let path = temp.path().join(DEFAULT_KEY_FILE_NAME);
        let mut key_file = MasterKeyFile::from_json(&std::fs::read(&path).unwrap()).unwrap();
        key_file.version_mac[0] ^= 1;
        std::fs::write(&path, key_file.to_json().unwrap()).unwrap();

        let result = locked.unlock(&mut b"secret".to_vec());
        assert!(matches!(
            result,
            Err(VaultError::UnsupportedVaultFormat { version: 7, .. })
        ));
    }

    #[test]
    fn change_passphrase_keeps_backup_and_keys() {
        let temp = TempDir::new().unwrap();
        let vault = create(&temp, "old");
        vault
            .access()
            .create_file(&VaultPath::root(), "kept.txt")
            .unwrap();
        let locked = vault.lock();

        locked
            .change_passphrase(&mut b"old".to_vec(), &mut b"new".to_vec(), KdfConfig::fast())
            .unwrap();
        assert!(temp.path().join("masterkey.cryptomator.bkup").is_file());
        assert!(!temp.path().join("masterkey.cryptomator.tmp").exists());

        let vault = locked.clone().unlock(&mut b"new".to_vec()).unwrap();
        let names: Vec<_> = vault
            .access()
            .list(&VaultPath::root())
            .unwrap()
            .into_iter()
            .map(|e| e.unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["kept.txt"]);

        let old = vault.lock().unlock(&mut b"old".to_vec());
        assert!(matches!(old, Err(VaultError::InvalidPassphrase)));
    }

    #[test]
    fn malformed_key_file() {
        let temp = TempDir::new().unwrap();
        let locked = create(&temp, "secret").lock();
        std::fs::write(temp.path().join(DEFAULT_KEY_FILE_NAME), b"{ not json").unwrap();
        let result = locked.unlock(&mut b"secret".to_vec());
        assert!(matches!(result, Err(VaultError::MalformedKeyFile { .. })));
    }
}
