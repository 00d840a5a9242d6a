//! Vault-level abstractions and operations

pub mod cache;
pub mod capability;
pub mod config;
pub mod lifecycle;
pub mod master_key;
pub mod operations;
pub mod path;

// Re-export commonly used types
pub use cache::{CacheStats, NameCacheConfig, NameCodec};
pub use capability::{Capability, CapabilityCheck, MissingCapability, ProbingCapabilityCheck};
pub use config::{DEFAULT_KEY_FILE_NAME, Vault, VaultFlags};
pub use lifecycle::{
    LockedVault, UnlockedVault, VaultCreator, VaultError, contains_vault, create_vault, open_vault,
};
pub use master_key::{KdfConfig, MasterKeyFile};
pub use operations::{
    CipherEntry, DeleteStats, EntryError, EntryType, NewEntry, OpContext, VaultAccess,
    VaultOperationError,
};
pub use path::{DirId, VaultPath};
