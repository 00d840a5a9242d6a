//! Cryptographic primitives and the cryptor seam used by the vault engine.
//!
//! Everything above this module talks to encryption only through the
//! [`Cryptor`] trait: names, directory-ID hashing, file headers and chunks.
//! [`SivCtrMacCryptor`] is the vault format 7 implementation.

pub mod key_wrap;
pub mod keys;
pub mod siv_ctrmac;
mod thread_safety; // Send + Sync impls for MasterKey

use thiserror::Error;
use zeroize::Zeroizing;

use crate::fs::name::NameError;

pub use keys::{KeyAccessError, MasterKey};
pub use siv_ctrmac::SivCtrMacCryptor;

/// Errors that can occur during cryptographic operations.
///
/// Variants marked `[INTEGRITY VIOLATION]` mean authenticated data did not
/// verify: the ciphertext was tampered with, truncated, or belongs to a
/// different key.
#[derive(Error, Debug)]
pub enum CryptoError {
    // =========================================================================
    // INTEGRITY VIOLATIONS - Potential adversarial tampering
    // =========================================================================
    /// File header MAC did not verify.
    #[error("[INTEGRITY VIOLATION] File header authentication failed")]
    HeaderAuthentication,

    /// Content chunk MAC did not verify.
    #[error("[INTEGRITY VIOLATION] Authentication failed for chunk {chunk}")]
    ChunkAuthentication { chunk: u64 },

    /// Version MAC in the masterkey file did not verify.
    #[error("[INTEGRITY VIOLATION] Masterkey version MAC verification failed")]
    HmacVerificationFailed,

    // =========================================================================
    // USER ERRORS - Typically wrong password or corrupted input
    // =========================================================================
    /// RFC 3394 integrity check failed while unwrapping the master keys.
    ///
    /// Wrong passphrase and a tampered key file are indistinguishable here.
    #[error("Key unwrap failed - incorrect passphrase or corrupted/tampered vault")]
    KeyUnwrapIntegrityFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Invalid chunk {chunk}: {reason}")]
    InvalidChunk { chunk: u64, reason: String },

    // =========================================================================
    // PROGRAMMING ERRORS - Invalid parameters or implementation bugs
    // =========================================================================
    #[error("Invalid scrypt parameters: {0}")]
    InvalidScryptParams(String),

    #[error("Invalid ciphertext length for key unwrap")]
    InvalidCiphertextLength,

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Key wrap failed: {0}")]
    KeyWrap(#[from] key_wrap::WrapError),

    /// **[SYSTEM ERROR]** mlock/mprotect failure or a poisoned key lock.
    #[error("Key access failed: {0}")]
    KeyAccess(#[from] KeyAccessError),
}

impl CryptoError {
    /// True for failures caused by authenticated data that did not verify.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            CryptoError::HeaderAuthentication
                | CryptoError::ChunkAuthentication { .. }
                | CryptoError::HmacVerificationFailed
        )
    }
}

impl From<key_wrap::UnwrapError> for CryptoError {
    fn from(err: key_wrap::UnwrapError) -> Self {
        match err {
            key_wrap::UnwrapError::InvalidCiphertextLength
            | key_wrap::UnwrapError::CiphertextTooShort => CryptoError::InvalidCiphertextLength,
            key_wrap::UnwrapError::InvalidIntegrityCheck => CryptoError::KeyUnwrapIntegrityFailed,
        }
    }
}

/// Encryption capability of one unlocked vault.
///
/// All operations are deterministic for identical inputs except
/// [`create_header`](Cryptor::create_header), which draws fresh randomness.
/// Framing constants are owned by the implementation and must be used
/// verbatim by callers.
pub trait Cryptor: Send + Sync {
    /// Decrypted per-file header (nonce and content key material).
    type Header: Send + Sync;

    /// Encrypt a cleartext name, bound to the parent directory ID.
    ///
    /// Returns the encoded ciphertext without the `.c9r` suffix.
    fn encrypt_filename(&self, cleartext: &str, dir_id: &str) -> Result<String, NameError>;

    /// Inverse of [`encrypt_filename`](Cryptor::encrypt_filename). The input
    /// must not carry a suffix.
    fn decrypt_filename(&self, ciphertext: &str, dir_id: &str) -> Result<String, NameError>;

    /// Hash a directory ID to the 32-character string its shard path is built from.
    fn hash_directory_id(&self, dir_id: &str) -> Result<String, NameError>;

    fn header_size(&self) -> usize;
    fn cleartext_chunk_size(&self) -> usize;
    fn ciphertext_chunk_size(&self) -> usize;

    /// Longest encrypted name (suffix included) a container may carry.
    fn max_ciphertext_name_length(&self) -> usize;

    /// Upper bound for the contents of a directory marker file.
    fn max_dir_marker_length(&self) -> usize;

    fn create_header(&self) -> Result<Self::Header, CryptoError>;
    fn encrypt_header(&self, header: &Self::Header) -> Result<Vec<u8>, CryptoError>;
    fn decrypt_header(&self, ciphertext: &[u8]) -> Result<Self::Header, CryptoError>;

    /// Encrypt one cleartext chunk (at most `cleartext_chunk_size` bytes).
    fn encrypt_chunk(
        &self,
        cleartext: &[u8],
        chunk_number: u64,
        header: &Self::Header,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Authenticate and decrypt one ciphertext chunk.
    fn decrypt_chunk(
        &self,
        ciphertext: &[u8],
        chunk_number: u64,
        header: &Self::Header,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Per-chunk ciphertext overhead.
    fn chunk_overhead(&self) -> usize {
        self.ciphertext_chunk_size() - self.cleartext_chunk_size()
    }
}
