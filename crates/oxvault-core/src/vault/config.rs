//! Format constants and the persisted vault record.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use uuid::Uuid;

/// Vault format version written to and accepted from key files.
pub const VAULT_VERSION: u32 = 7;

/// Data root holding every shard directory.
pub const DATA_DIR_NAME: &str = "d";

/// Suffix of every regular ciphertext container.
pub const CIPHERTEXT_SUFFIX: &str = ".c9r";

/// Suffix of shortened (deflated) long-name sidecars. Recognised, not read.
pub const SHORTENED_SUFFIX: &str = ".c9s";

/// Marker file inside a directory container; holds the child directory ID.
pub const DIR_MARKER_FILE: &str = "dir.c9r";

/// Marker file inside a symlink container. Recognised, not read.
pub const SYMLINK_MARKER_FILE: &str = "symlink.c9r";

/// Default key file name.
pub const DEFAULT_KEY_FILE_NAME: &str = "masterkey.cryptomator";

/// Suffix of the key file copy kept by a passphrase change.
pub const KEY_FILE_BACKUP_SUFFIX: &str = ".bkup";

/// Suffix of the scratch file written by a header-rotating merge.
pub const ROTATION_TEMP_SUFFIX: &str = ".tmp";

/// Feature flags carried by a [`Vault`] record.
///
/// Only `read_only` changes core behaviour; `auto_lock` belongs to whoever
/// manages unlocked sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultFlags {
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub auto_lock: bool,
}

/// One known vault, as an external registry persists it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: Uuid,
    pub name: String,
    /// Container directory on the host
    pub root: PathBuf,
    pub key_file_name: String,
    /// Application-wide secret mixed into the KDF salt
    #[serde_as(as = "Base64")]
    #[serde(default)]
    pub pepper: Vec<u8>,
    #[serde(default)]
    pub flags: VaultFlags,
}

impl Vault {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            root: root.into(),
            key_file_name: DEFAULT_KEY_FILE_NAME.to_string(),
            pepper: Vec::new(),
            flags: VaultFlags::default(),
        }
    }

    #[must_use]
    pub fn with_key_file_name(mut self, key_file_name: impl Into<String>) -> Self {
        self.key_file_name = key_file_name.into();
        self
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_as_camel_case_json() {
        let vault = Vault::new("Work", "/tmp/work")
            .with_pepper(b"pepper".to_vec())
            .with_flags(VaultFlags {
                read_only: true,
                auto_lock: false,
            });
        let json = serde_json::to_value(&vault).unwrap();
        assert_eq!(json["keyFileName"], DEFAULT_KEY_FILE_NAME);
        assert_eq!(json["pepper"], "cGVwcGVy");
        assert_eq!(json["flags"]["readOnly"], true);

        let back: Vault = serde_json::from_value(json).unwrap();
        assert_eq!(back, vault);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "Old",
            "root": "/vaults/old",
            "keyFileName": "masterkey.cryptomator"
        }"#;
        let vault: Vault = serde_json::from_str(json).unwrap();
        assert!(vault.pepper.is_empty());
        assert_eq!(vault.flags, VaultFlags::default());
    }
}
