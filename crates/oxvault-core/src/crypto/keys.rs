#![forbid(unsafe_code)]

use std::sync::RwLock;

use generic_array::{GenericArray, typenum::U64};
use memsafe::MemSafe;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

/// Error type for key access operations.
///
/// Raised when protected key memory cannot be made readable, or when a thread
/// panicked while holding the key lock.
#[derive(Debug, Error)]
pub enum KeyAccessError {
    /// Memory protection operation failed (mlock, mprotect, etc.)
    #[error("Memory protection operation failed: {0}")]
    MemoryProtection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Lock was poisoned (a thread panicked while holding it)
    #[error("Key lock was poisoned")]
    LockPoisoned,
}

impl KeyAccessError {
    pub fn memory_protection<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        KeyAccessError::MemoryProtection(Box::new(err))
    }
}

/// The 512-bit key pair of an unlocked vault: a 256-bit AES key and a 256-bit
/// MAC key.
///
/// Both halves live in `memsafe` containers (mlocked, `PROT_NONE` while idle,
/// zeroed on drop). Key bytes are only reachable through the scoped `with_*`
/// accessors; they never escape the closure.
///
/// `MasterKey` is `Send + Sync` (see `thread_safety.rs`) and is shared as
/// `Arc<MasterKey>` by a cryptor.
#[derive(Debug)]
pub struct MasterKey {
    aes_master_key: RwLock<MemSafe<[u8; 32]>>,
    mac_master_key: RwLock<MemSafe<[u8; 32]>>,
}

impl MasterKey {
    /// Generate a fresh key pair from the thread-local CSPRNG.
    pub fn random() -> Result<Self, KeyAccessError> {
        let mut aes_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        rand::rng().fill_bytes(&mut aes_key);
        rand::rng().fill_bytes(&mut mac_key);
        let key = Self::new(aes_key, mac_key);
        aes_key.zeroize();
        mac_key.zeroize();
        key
    }

    /// Move raw key material into protected memory.
    ///
    /// The caller remains responsible for wiping its own copies of the arrays.
    pub fn new(aes_key: [u8; 32], mac_key: [u8; 32]) -> Result<Self, KeyAccessError> {
        Ok(MasterKey {
            aes_master_key: RwLock::new(
                MemSafe::new(aes_key).map_err(KeyAccessError::memory_protection)?,
            ),
            mac_master_key: RwLock::new(
                MemSafe::new(mac_key).map_err(KeyAccessError::memory_protection)?,
            ),
        })
    }

    /// Fallible deep copy into a second set of protected pages.
    pub fn try_clone(&self) -> Result<Self, KeyAccessError> {
        let mut aes_key = self.with_aes_key(|k| *k)?;
        let mut mac_key = self.with_mac_key(|k| *k)?;
        let cloned = Self::new(aes_key, mac_key);
        aes_key.zeroize();
        mac_key.zeroize();
        cloned
    }

    /// Run `f` with the 32-byte AES key.
    pub fn with_aes_key<F, R>(&self, f: F) -> Result<R, KeyAccessError>
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        Self::with_protected(&self.aes_master_key, f)
    }

    /// Run `f` with the 32-byte MAC key.
    pub fn with_mac_key<F, R>(&self, f: F) -> Result<R, KeyAccessError>
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        Self::with_protected(&self.mac_master_key, f)
    }

    /// Run `f` with both keys concatenated in AES-SIV order (MAC || AES).
    ///
    /// The temporary 64-byte buffer is zeroed when `f` returns.
    pub fn with_siv_key<F, R>(&self, f: F) -> Result<R, KeyAccessError>
    where
        F: FnOnce(&GenericArray<u8, U64>) -> R,
    {
        // GenericArray doesn't implement DefaultIsZeroes
        struct ZeroizeOnDrop(GenericArray<u8, U64>);

        impl Drop for ZeroizeOnDrop {
            fn drop(&mut self) {
                self.0.zeroize();
            }
        }

        let mut key = ZeroizeOnDrop(GenericArray::<u8, U64>::default());
        self.with_mac_key(|mac| key.0[..32].copy_from_slice(mac))?;
        self.with_aes_key(|aes| key.0[32..].copy_from_slice(aes))?;

        Ok(f(&key.0))
    }

    fn with_protected<F, R>(slot: &RwLock<MemSafe<[u8; 32]>>, f: F) -> Result<R, KeyAccessError>
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        // MemSafe::read needs &mut to flip page protection, hence the write lock
        let mut lock = slot.write().map_err(|_| KeyAccessError::LockPoisoned)?;
        let guard = lock.read().map_err(KeyAccessError::memory_protection)?;
        Ok(f(&guard))
    }
}
