//! AES-CTR + HMAC-SHA256 file content encryption (vault format 7).
//!
//! # File Header Format (88 bytes)
//!
//! | Offset | Size | Description |
//! |--------|------|-------------|
//! | 0      | 16   | Nonce (IV for AES-CTR) |
//! | 16     | 40   | Encrypted payload (8-byte reserved + 32-byte content key) |
//! | 56     | 32   | HMAC-SHA256 over nonce + encrypted payload |
//!
//! # Content Chunk Format (up to 32816 bytes)
//!
//! | Offset | Size | Description |
//! |--------|------|-------------|
//! | 0      | 16   | Chunk nonce |
//! | 16     | n    | AES-CTR encrypted payload (up to 32768 bytes) |
//! | 16+n   | 32   | HMAC-SHA256 over (header_nonce + chunk_number + nonce + ciphertext) |
//!
//! Every chunk is sealed independently, so any chunk can be decrypted given
//! only the header and its index.

use std::fmt;

use aes::cipher::{KeyIvInit, StreamCipher};
use generic_array::GenericArray;
use rand::RngCore;
use ring::hmac;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, trace, warn};
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, MasterKey};

// ============================================================================
// Constants
// ============================================================================

/// Nonce size for AES-CTR (16 bytes)
pub const NONCE_SIZE: usize = 16;

/// HMAC-SHA256 output size (32 bytes)
pub const MAC_SIZE: usize = 32;

/// Cleartext payload size per chunk (32 KiB)
pub const PAYLOAD_SIZE: usize = 32 * 1024;

/// Total encrypted chunk size: nonce + payload + MAC
pub const CHUNK_SIZE: usize = NONCE_SIZE + PAYLOAD_SIZE + MAC_SIZE;

/// Header payload size (8-byte reserved + 32-byte content key)
const HEADER_PAYLOAD_SIZE: usize = 40;

/// File header size: nonce + encrypted payload + MAC
pub const HEADER_SIZE: usize = NONCE_SIZE + HEADER_PAYLOAD_SIZE + MAC_SIZE; // 88 bytes

/// AES-256-CTR with a big-endian 128-bit counter
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

// ============================================================================
// File Header
// ============================================================================

/// Decrypted file header.
pub struct CtrMacFileHeader {
    /// Header nonce; also mixed into every chunk MAC
    pub nonce: [u8; NONCE_SIZE],
    /// Per-file content key
    pub content_key: Zeroizing<[u8; 32]>,
}

impl CtrMacFileHeader {
    /// Fresh random nonce and content key.
    pub fn random() -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        let mut content_key = Zeroizing::new([0u8; 32]);
        rand::rng().fill_bytes(&mut nonce);
        rand::rng().fill_bytes(&mut content_key[..]);
        Self { nonce, content_key }
    }
}

impl fmt::Debug for CtrMacFileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtrMacFileHeader")
            .field("nonce", &hex::encode(self.nonce))
            .field("content_key", &"[REDACTED]")
            .finish()
    }
}

/// Seal a header under the vault keys.
pub fn encrypt_header(
    header: &CtrMacFileHeader,
    master_key: &MasterKey,
) -> Result<Vec<u8>, CryptoError> {
    // reserved (-1L, i.e. 8 bytes of 0xFF) || content key
    let mut payload = Zeroizing::new([0xFFu8; HEADER_PAYLOAD_SIZE]);
    payload[8..].copy_from_slice(&header.content_key[..]);

    master_key.with_aes_key(|aes_key| {
        let mut cipher = Aes256Ctr::new(aes_key.into(), (&header.nonce).into());
        cipher.apply_keystream(&mut payload[..]);
    })?;

    let mut sealed = Vec::with_capacity(HEADER_SIZE);
    sealed.extend_from_slice(&header.nonce);
    sealed.extend_from_slice(&payload[..]);

    let mac = master_key.with_mac_key(|mac_key| {
        let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
        hmac::sign(&key, &sealed)
    })?;
    sealed.extend_from_slice(mac.as_ref());

    Ok(sealed)
}

/// Verify and open a sealed header.
#[instrument(level = "trace", skip_all, fields(header_size = encrypted_header.len()))]
pub fn decrypt_header(
    encrypted_header: &[u8],
    master_key: &MasterKey,
) -> Result<CtrMacFileHeader, CryptoError> {
    if encrypted_header.len() != HEADER_SIZE {
        warn!(
            actual_size = encrypted_header.len(),
            expected_size = HEADER_SIZE,
            "Invalid header size"
        );
        return Err(CryptoError::InvalidHeader {
            reason: format!(
                "expected {HEADER_SIZE} bytes, got {} bytes",
                encrypted_header.len()
            ),
        });
    }

    let (authenticated, expected_mac) = encrypted_header.split_at(NONCE_SIZE + HEADER_PAYLOAD_SIZE);
    let (nonce_bytes, ciphertext) = authenticated.split_at(NONCE_SIZE);

    // Authenticate before decrypting
    let verified = master_key.with_mac_key(|mac_key| {
        let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
        let computed = hmac::sign(&key, authenticated);
        bool::from(computed.as_ref().ct_eq(expected_mac))
    })?;
    if !verified {
        warn!("Header HMAC verification failed");
        return Err(CryptoError::HeaderAuthentication);
    }

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);

    let mut payload = Zeroizing::new([0u8; HEADER_PAYLOAD_SIZE]);
    payload.copy_from_slice(ciphertext);
    master_key.with_aes_key(|aes_key| {
        let mut cipher = Aes256Ctr::new(aes_key.into(), (&nonce).into());
        cipher.apply_keystream(&mut payload[..]);
    })?;

    if payload[..8] != [0xFF; 8] {
        debug!(
            reserved_bytes = %hex::encode(&payload[..8]),
            "Header has non-standard reserved bytes"
        );
    }

    let mut content_key = Zeroizing::new([0u8; 32]);
    content_key.copy_from_slice(&payload[8..]);

    Ok(CtrMacFileHeader { nonce, content_key })
}

// ============================================================================
// File Content
// ============================================================================

fn chunk_mac(
    hmac_key: &hmac::Key,
    header_nonce: &[u8; NONCE_SIZE],
    chunk_number: u64,
    chunk_nonce: &[u8],
    ciphertext: &[u8],
) -> hmac::Tag {
    // MAC(header_nonce || chunk_number_be || chunk_nonce || ciphertext)
    let mut ctx = hmac::Context::with_key(hmac_key);
    ctx.update(header_nonce);
    ctx.update(&chunk_number.to_be_bytes());
    ctx.update(chunk_nonce);
    ctx.update(ciphertext);
    ctx.sign()
}

/// Encrypt a single chunk of at most [`PAYLOAD_SIZE`] bytes.
pub fn encrypt_chunk(
    cleartext: &[u8],
    chunk_number: u64,
    header: &CtrMacFileHeader,
    master_key: &MasterKey,
) -> Result<Vec<u8>, CryptoError> {
    if cleartext.len() > PAYLOAD_SIZE {
        return Err(CryptoError::InvalidChunk {
            chunk: chunk_number,
            reason: format!(
                "cleartext chunk of {} bytes exceeds {PAYLOAD_SIZE}",
                cleartext.len()
            ),
        });
    }

    let mut chunk_nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut chunk_nonce);

    let mut sealed = Vec::with_capacity(NONCE_SIZE + cleartext.len() + MAC_SIZE);
    sealed.extend_from_slice(&chunk_nonce);
    sealed.extend_from_slice(cleartext);

    let mut cipher = Aes256Ctr::new((&*header.content_key).into(), (&chunk_nonce).into());
    cipher.apply_keystream(&mut sealed[NONCE_SIZE..]);

    let mac = master_key.with_mac_key(|mac_key| {
        let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
        chunk_mac(&key, &header.nonce, chunk_number, &chunk_nonce, &sealed[NONCE_SIZE..])
    })?;
    sealed.extend_from_slice(mac.as_ref());

    trace!(chunk = chunk_number, size = sealed.len(), "Chunk encrypted");
    Ok(sealed)
}

/// Authenticate and decrypt a single chunk.
pub fn decrypt_chunk(
    ciphertext: &[u8],
    chunk_number: u64,
    header: &CtrMacFileHeader,
    master_key: &MasterKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < NONCE_SIZE + MAC_SIZE || ciphertext.len() > CHUNK_SIZE {
        warn!(
            chunk = chunk_number,
            actual_size = ciphertext.len(),
            "Chunk has impossible size"
        );
        return Err(CryptoError::InvalidChunk {
            chunk: chunk_number,
            reason: format!(
                "expected between {} and {CHUNK_SIZE} bytes, got {}",
                NONCE_SIZE + MAC_SIZE,
                ciphertext.len()
            ),
        });
    }

    let (chunk_nonce, rest) = ciphertext.split_at(NONCE_SIZE);
    let (payload, expected_mac) = rest.split_at(rest.len() - MAC_SIZE);

    let verified = master_key.with_mac_key(|mac_key| {
        let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
        let computed = chunk_mac(&key, &header.nonce, chunk_number, chunk_nonce, payload);
        bool::from(computed.as_ref().ct_eq(expected_mac))
    })?;
    if !verified {
        warn!(chunk = chunk_number, "Chunk HMAC verification failed");
        return Err(CryptoError::ChunkAuthentication {
            chunk: chunk_number,
        });
    }

    let mut cleartext = Zeroizing::new(payload.to_vec());
    let mut cipher = Aes256Ctr::new(
        (&*header.content_key).into(),
        GenericArray::from_slice(chunk_nonce),
    );
    cipher.apply_keystream(&mut cleartext);

    trace!(chunk = chunk_number, size = cleartext.len(), "Chunk decrypted");
    Ok(cleartext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> MasterKey {
        MasterKey::new([7u8; 32], [9u8; 32]).unwrap()
    }

    #[test]
    fn header_is_88_bytes_and_opens() {
        let key = test_key();
        let header = CtrMacFileHeader::random();
        let sealed = encrypt_header(&header, &key).unwrap();
        assert_eq!(sealed.len(), HEADER_SIZE);

        let opened = decrypt_header(&sealed, &key).unwrap();
        assert_eq!(opened.nonce, header.nonce);
        assert_eq!(*opened.content_key, *header.content_key);
    }

    #[test]
    fn tampered_header_is_rejected() {
        let key = test_key();
        let mut sealed = encrypt_header(&CtrMacFileHeader::random(), &key).unwrap();
        sealed[20] ^= 0x01;
        assert!(matches!(
            decrypt_header(&sealed, &key),
            Err(CryptoError::HeaderAuthentication)
        ));
    }

    #[test]
    fn chunk_is_bound_to_its_index() {
        let key = test_key();
        let header = CtrMacFileHeader::random();
        let sealed = encrypt_chunk(b"hello chunk", 3, &header, &key).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 11 + MAC_SIZE);

        assert_eq!(
            decrypt_chunk(&sealed, 3, &header, &key).unwrap().as_slice(),
            b"hello chunk"
        );
        assert!(matches!(
            decrypt_chunk(&sealed, 4, &header, &key),
            Err(CryptoError::ChunkAuthentication { chunk: 4 })
        ));
    }

    #[test]
    fn chunk_is_bound_to_its_header() {
        let key = test_key();
        let header = CtrMacFileHeader::random();
        let other = CtrMacFileHeader::random();
        let sealed = encrypt_chunk(b"data", 0, &header, &key).unwrap();
        assert!(decrypt_chunk(&sealed, 0, &other, &key).is_err());
    }

    #[test]
    fn oversized_and_truncated_chunks_are_rejected() {
        let key = test_key();
        let header = CtrMacFileHeader::random();
        assert!(matches!(
            encrypt_chunk(&vec![0u8; PAYLOAD_SIZE + 1], 0, &header, &key),
            Err(CryptoError::InvalidChunk { .. })
        ));
        assert!(matches!(
            decrypt_chunk(&[0u8; NONCE_SIZE + MAC_SIZE - 1], 0, &header, &key),
            Err(CryptoError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn empty_chunk_carries_only_overhead() {
        let key = test_key();
        let header = CtrMacFileHeader::random();
        let sealed = encrypt_chunk(&[], 0, &header, &key).unwrap();
        assert_eq!(sealed.len(), CHUNK_SIZE - PAYLOAD_SIZE);
        assert!(decrypt_chunk(&sealed, 0, &header, &key).unwrap().is_empty());
    }
}
