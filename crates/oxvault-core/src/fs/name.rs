use std::fmt;

use aes_siv::{KeyInit, siv::Aes256Siv};
use base64::{Engine as _, engine::general_purpose};
use data_encoding::BASE32;
use ring::digest;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::crypto::keys::{KeyAccessError, MasterKey};

/// Context for filename operations, providing debugging information.
#[derive(Debug, Clone, Default)]
pub struct NameContext {
    /// The encrypted filename (if available)
    pub encrypted_name: Option<String>,
    /// The cleartext filename (if available, e.g., during encryption)
    pub cleartext_name: Option<String>,
    /// The parent directory ID
    pub dir_id: Option<String>,
}

impl NameContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_encrypted_name(mut self, name: impl Into<String>) -> Self {
        self.encrypted_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_cleartext_name(mut self, name: impl Into<String>) -> Self {
        self.cleartext_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_dir_id(mut self, dir_id: impl Into<String>) -> Self {
        self.dir_id = Some(dir_id.into());
        self
    }
}

/// `s` unchanged if it has at most `limit` chars, else its first `keep`
/// chars followed by `...`. Counts chars, so names read from storage never
/// split inside a code point.
pub(crate) fn abbreviate(s: &str, limit: usize, keep: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_owned();
    }
    let end = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
    format!("{}...", &s[..end])
}

impl fmt::Display for NameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(ref name) = self.cleartext_name {
            parts.push(format!("filename '{name}'"));
        } else if let Some(ref enc_name) = self.encrypted_name {
            // Long ciphertext names drown the message
            let display_name = abbreviate(enc_name, 40, 37);
            parts.push(format!("encrypted name '{display_name}'"));
        }

        if let Some(ref dir_id) = self.dir_id {
            let display_id = if dir_id.is_empty() {
                "<root>".to_string()
            } else {
                abbreviate(dir_id, 12, 12)
            };
            parts.push(format!("in directory {display_id}"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// Errors that can occur during filename encryption/decryption.
///
/// AES-SIV is authenticated, so a decryption failure means the name was
/// tampered with, belongs to another vault, or was moved between directories.
#[derive(Error, Debug)]
pub enum NameError {
    // =========================================================================
    // INTEGRITY VIOLATIONS - Potential adversarial tampering
    // =========================================================================
    /// **[INTEGRITY VIOLATION]** AES-SIV authentication failed.
    #[error("[INTEGRITY VIOLATION] Failed to decrypt {context}: authentication failed - possible tampering, wrong key, or filename moved between directories")]
    DecryptionFailed { context: NameContext },

    // =========================================================================
    // INPUT ERRORS - Malformed or corrupted input
    // =========================================================================
    #[error("Invalid base64 encoding for {context}: {reason}")]
    Base64Decode { reason: String, context: NameContext },

    #[error("Invalid UTF-8 after decryption for {context}: {reason}")]
    Utf8Decode { reason: String, context: NameContext },

    /// The encrypted form would exceed the container name limit. Shortened
    /// `.c9s` sidecars are not written by this crate.
    #[error("Name too long for {context}: encrypted form is {length} characters, limit is {limit}")]
    NameTooLong {
        length: usize,
        limit: usize,
        context: NameContext,
    },

    /// The entry uses a storage form this crate does not read (e.g. `.c9s`).
    #[error("Unsupported name form for {context}")]
    Unsupported { context: NameContext },

    // =========================================================================
    // PROGRAMMING ERRORS - Should not happen in normal operation
    // =========================================================================
    #[error("Unexpected encryption failure for {context}")]
    EncryptionFailed { context: NameContext },

    #[error("Failed to hash directory ID '{dir_id}': encryption error")]
    DirIdHashFailed { dir_id: String },

    /// **[SYSTEM ERROR]** mlock/mprotect failure or a poisoned key lock.
    #[error("Key access failed: {0}")]
    KeyAccess(#[from] KeyAccessError),
}

impl NameError {
    /// Replace the context carried by this error.
    #[must_use]
    pub fn with_context(self, new_context: NameContext) -> Self {
        match self {
            NameError::DecryptionFailed { .. } => NameError::DecryptionFailed {
                context: new_context,
            },
            NameError::Base64Decode { reason, .. } => NameError::Base64Decode {
                reason,
                context: new_context,
            },
            NameError::Utf8Decode { reason, .. } => NameError::Utf8Decode {
                reason,
                context: new_context,
            },
            NameError::NameTooLong { length, limit, .. } => NameError::NameTooLong {
                length,
                limit,
                context: new_context,
            },
            NameError::Unsupported { .. } => NameError::Unsupported {
                context: new_context,
            },
            NameError::EncryptionFailed { .. } => NameError::EncryptionFailed {
                context: new_context,
            },
            other @ (NameError::DirIdHashFailed { .. } | NameError::KeyAccess(_)) => other,
        }
    }
}

/// Hash a directory ID into the 32-character string that names its shard.
///
/// AES-SIV(dir_id, no associated data) → SHA-1 → RFC 4648 Base32. The shard
/// directory is `d/{hash[0:2]}/{hash[2:]}`.
pub fn hash_dir_id(dir_id: &str, master_key: &MasterKey) -> Result<String, NameError> {
    master_key.with_siv_key(|key| {
        let mut cipher = Aes256Siv::new(key);

        let associated_data: &[&[u8]] = &[];
        let encrypted = cipher
            .encrypt(associated_data, dir_id.as_bytes())
            .map_err(|_| NameError::DirIdHashFailed {
                dir_id: dir_id.to_string(),
            })?;

        let hashed = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &encrypted);
        Ok(BASE32.encode(hashed.as_ref()))
    })?
}

/// Encrypt a filename with AES-SIV, bound to the parent directory ID.
///
/// The name is NFC-normalized first. Output is base64url with padding and
/// carries no `.c9r` suffix.
pub fn encrypt_filename(
    name: &str,
    parent_dir_id: &str,
    master_key: &MasterKey,
) -> Result<String, NameError> {
    let normalized_name: String = name.nfc().collect();

    master_key.with_siv_key(|key| {
        let mut cipher = Aes256Siv::new(key);

        let associated_data: &[&[u8]] = &[parent_dir_id.as_bytes()];
        let encrypted = cipher
            .encrypt(associated_data, normalized_name.as_bytes())
            .map_err(|_| NameError::EncryptionFailed {
                context: NameContext::new()
                    .with_cleartext_name(name)
                    .with_dir_id(parent_dir_id),
            })?;

        Ok(general_purpose::URL_SAFE.encode(&encrypted))
    })?
}

/// Decrypt a filename produced by [`encrypt_filename`].
///
/// Padded base64url is expected; unpadded input is accepted too.
pub fn decrypt_filename(
    encrypted_name: &str,
    parent_dir_id: &str,
    master_key: &MasterKey,
) -> Result<String, NameError> {
    let context = || {
        NameContext::new()
            .with_encrypted_name(encrypted_name)
            .with_dir_id(parent_dir_id)
    };

    let decoded = general_purpose::URL_SAFE
        .decode(encrypted_name.as_bytes())
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(encrypted_name.as_bytes()))
        .map_err(|e| NameError::Base64Decode {
            reason: e.to_string(),
            context: context(),
        })?;

    master_key.with_siv_key(|key| {
        let mut cipher = Aes256Siv::new(key);

        let associated_data: &[&[u8]] = &[parent_dir_id.as_bytes()];
        let decrypted = cipher
            .decrypt(associated_data, &decoded)
            .map_err(|_| NameError::DecryptionFailed { context: context() })?;

        String::from_utf8(decrypted).map_err(|e| NameError::Utf8Decode {
            reason: e.to_string(),
            context: context(),
        })
    })?
}
