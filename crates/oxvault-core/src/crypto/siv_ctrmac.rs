//! Vault format 7 cryptor: AES-SIV names, AES-CTR + HMAC-SHA256 content.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::fs::file_ctrmac::{self, CtrMacFileHeader};
use crate::fs::name::{self, NameError};

use super::{CryptoError, Cryptor, MasterKey};

/// Longest encrypted container name (suffix included) before format 7 would
/// shorten it to a `.c9s` sidecar.
pub const MAX_CIPHERTEXT_NAME_LENGTH: usize = 220;

/// Longest cleartext name that always fits in [`MAX_CIPHERTEXT_NAME_LENGTH`].
pub const MAX_CLEARTEXT_NAME_LENGTH: usize = 146;

/// Directory IDs are UUID strings.
pub const MAX_DIR_FILE_LENGTH: usize = 36;

/// Cryptor for the `SIV_CTRMAC` cipher combo.
///
/// Cheap to clone; clones share the same protected [`MasterKey`].
#[derive(Clone)]
pub struct SivCtrMacCryptor {
    master_key: Arc<MasterKey>,
}

impl SivCtrMacCryptor {
    pub fn new(master_key: Arc<MasterKey>) -> Self {
        Self { master_key }
    }

    pub fn master_key(&self) -> &Arc<MasterKey> {
        &self.master_key
    }
}

impl fmt::Debug for SivCtrMacCryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SivCtrMacCryptor").finish_non_exhaustive()
    }
}

impl Cryptor for SivCtrMacCryptor {
    type Header = CtrMacFileHeader;

    fn encrypt_filename(&self, cleartext: &str, dir_id: &str) -> Result<String, NameError> {
        name::encrypt_filename(cleartext, dir_id, &self.master_key)
    }

    fn decrypt_filename(&self, ciphertext: &str, dir_id: &str) -> Result<String, NameError> {
        name::decrypt_filename(ciphertext, dir_id, &self.master_key)
    }

    fn hash_directory_id(&self, dir_id: &str) -> Result<String, NameError> {
        name::hash_dir_id(dir_id, &self.master_key)
    }

    fn header_size(&self) -> usize {
        file_ctrmac::HEADER_SIZE
    }

    fn cleartext_chunk_size(&self) -> usize {
        file_ctrmac::PAYLOAD_SIZE
    }

    fn ciphertext_chunk_size(&self) -> usize {
        file_ctrmac::CHUNK_SIZE
    }

    fn max_ciphertext_name_length(&self) -> usize {
        MAX_CIPHERTEXT_NAME_LENGTH
    }

    fn max_dir_marker_length(&self) -> usize {
        MAX_DIR_FILE_LENGTH
    }

    fn create_header(&self) -> Result<CtrMacFileHeader, CryptoError> {
        Ok(CtrMacFileHeader::random())
    }

    fn encrypt_header(&self, header: &CtrMacFileHeader) -> Result<Vec<u8>, CryptoError> {
        file_ctrmac::encrypt_header(header, &self.master_key)
    }

    fn decrypt_header(&self, ciphertext: &[u8]) -> Result<CtrMacFileHeader, CryptoError> {
        file_ctrmac::decrypt_header(ciphertext, &self.master_key)
    }

    fn encrypt_chunk(
        &self,
        cleartext: &[u8],
        chunk_number: u64,
        header: &CtrMacFileHeader,
    ) -> Result<Vec<u8>, CryptoError> {
        file_ctrmac::encrypt_chunk(cleartext, chunk_number, header, &self.master_key)
    }

    fn decrypt_chunk(
        &self,
        ciphertext: &[u8],
        chunk_number: u64,
        header: &CtrMacFileHeader,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        file_ctrmac::decrypt_chunk(ciphertext, chunk_number, header, &self.master_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_constants() {
        let cryptor = SivCtrMacCryptor::new(Arc::new(MasterKey::random().unwrap()));
        assert_eq!(cryptor.header_size(), 88);
        assert_eq!(cryptor.cleartext_chunk_size(), 32768);
        assert_eq!(cryptor.ciphertext_chunk_size(), 32816);
        assert_eq!(cryptor.chunk_overhead(), 48);
    }

    #[test]
    fn header_and_chunk_through_trait() {
        let cryptor = SivCtrMacCryptor::new(Arc::new(MasterKey::random().unwrap()));
        let header = cryptor.create_header().unwrap();
        let sealed_header = cryptor.encrypt_header(&header).unwrap();
        let reopened = cryptor.decrypt_header(&sealed_header).unwrap();

        let chunk = cryptor.encrypt_chunk(b"payload", 0, &header).unwrap();
        assert_eq!(
            cryptor.decrypt_chunk(&chunk, 0, &reopened).unwrap().as_slice(),
            b"payload"
        );
    }

    #[test]
    fn longest_cleartext_name_fits() {
        let cryptor = SivCtrMacCryptor::new(Arc::new(MasterKey::random().unwrap()));
        let name = "n".repeat(MAX_CLEARTEXT_NAME_LENGTH);
        let encrypted = cryptor.encrypt_filename(&name, "").unwrap();
        assert!(encrypted.len() + ".c9r".len() <= MAX_CIPHERTEXT_NAME_LENGTH);
    }
}
