pub mod cat;
pub mod info;
pub mod init;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod passwd;
pub mod rm;
pub mod touch;
pub mod write;

use oxvault_core::crypto::SivCtrMacCryptor;
use oxvault_core::storage::LocalStorage;
use oxvault_core::vault::VaultAccess;

/// Entry operations of an unlocked vault on the local filesystem.
pub type Access = VaultAccess<SivCtrMacCryptor, LocalStorage>;
