//! Error types for the vault engine
//!
//! Each layer owns its error enum; this module gathers them with their
//! context structures.

pub use crate::crypto::{CryptoError, KeyAccessError};
pub use crate::fs::content::{ContentError, FileContext, InvalidCiphertextSize};
pub use crate::fs::name::{NameContext, NameError};
pub use crate::storage::StorageError;
pub use crate::vault::capability::MissingCapability;
pub use crate::vault::lifecycle::VaultError;
pub use crate::vault::operations::{EntryError, OpContext, VaultOperationError};
