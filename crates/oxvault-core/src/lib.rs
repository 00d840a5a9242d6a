//! Encrypted virtual filesystem over Cryptomator format 7 vaults.
//!
//! A cleartext namespace of files and directories is mapped onto sharded,
//! encrypted containers in any [`storage::Storage`] backend. File content is
//! chunk-encrypted and can be read and written at arbitrary offsets.

pub mod crypto;
pub mod error;
pub mod fs;
pub mod storage;
pub mod vault;

pub use vault::{LockedVault, UnlockedVault, VaultAccess, VaultCreator, VaultPath};
