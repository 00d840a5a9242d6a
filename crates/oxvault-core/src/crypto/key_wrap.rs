#![forbid(unsafe_code)]

//! AES-256 key wrapping as defined in [RFC 3394](https://datatracker.ietf.org/doc/html/rfc3394).
//!
//! Used to store the vault's master keys under a passphrase-derived KEK.

use aes::Aes256;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use generic_array::GenericArray;
use thiserror::Error;
use zeroize::Zeroizing;

/// Default initial value from RFC 3394 section 2.2.3.1.
const IV_3394: [u8; 8] = [0xa6; 8];

#[derive(Error, Debug)]
pub enum WrapError {
    #[error("The plaintext length is not a multiple of 64 bits per RFC3394.")]
    InvalidPlaintextLength,
}

#[derive(Error, Debug)]
pub enum UnwrapError {
    #[error("The ciphertext length is not a multiple of 64 bits per RFC3394.")]
    InvalidCiphertextLength,
    #[error("The ciphertext is shorter than the 24 bytes RFC3394 requires.")]
    CiphertextTooShort,
    #[error("The integrity check failed.")]
    InvalidIntegrityCheck,
}

/// Wrap `plaintext` (a multiple of 8 bytes) under `kek`.
///
/// Output is 8 bytes longer than the input.
pub fn wrap_key(plaintext: &[u8], kek: &[u8; 32]) -> Result<Vec<u8>, WrapError> {
    if plaintext.is_empty() || plaintext.len() % 8 != 0 {
        return Err(WrapError::InvalidPlaintextLength);
    }

    let cipher = Aes256::new(GenericArray::from_slice(kek));
    let n = plaintext.len() / 8;
    let mut a = IV_3394;
    let mut registers = Zeroizing::new(plaintext.to_vec());
    let mut block = GenericArray::from([0u8; 16]);

    for j in 0..6 {
        for (i, register) in registers.chunks_mut(8).enumerate() {
            // B = AES(K, A | R[i])
            block[..8].copy_from_slice(&a);
            block[8..].copy_from_slice(register);
            cipher.encrypt_block(&mut block);

            // A = MSB(64, B) ^ t, t = n*j + i (1-based)
            let t = ((n * j) + i + 1) as u64;
            for (dst, (b, t)) in a.iter_mut().zip(block[..8].iter().zip(t.to_be_bytes())) {
                *dst = b ^ t;
            }
            register.copy_from_slice(&block[8..]);
        }
    }
    block.iter_mut().for_each(|b| *b = 0);

    let mut ciphertext = Vec::with_capacity(plaintext.len() + 8);
    ciphertext.extend_from_slice(&a);
    ciphertext.extend_from_slice(&registers);
    Ok(ciphertext)
}

/// Unwrap `ciphertext` under `kek`.
///
/// A wrong KEK surfaces as [`UnwrapError::InvalidIntegrityCheck`].
pub fn unwrap_key(ciphertext: &[u8], kek: &[u8; 32]) -> Result<Zeroizing<Vec<u8>>, UnwrapError> {
    if ciphertext.len() % 8 != 0 {
        return Err(UnwrapError::InvalidCiphertextLength);
    }
    if ciphertext.len() < 24 {
        return Err(UnwrapError::CiphertextTooShort);
    }

    let cipher = Aes256::new(GenericArray::from_slice(kek));
    let n = ciphertext.len() / 8 - 1;
    let mut a = [0u8; 8];
    a.copy_from_slice(&ciphertext[..8]);
    let mut registers = Zeroizing::new(ciphertext[8..].to_vec());
    let mut block = GenericArray::from([0u8; 16]);

    for j in (0..6).rev() {
        for (i, register) in registers.chunks_mut(8).enumerate().rev() {
            // B = AES-1(K, (A ^ t) | R[i])
            let t = ((n * j) + i + 1) as u64;
            for (dst, (x, t)) in block[..8].iter_mut().zip(a.iter().zip(t.to_be_bytes())) {
                *dst = x ^ t;
            }
            block[8..].copy_from_slice(register);
            cipher.decrypt_block(&mut block);

            a.copy_from_slice(&block[..8]);
            register.copy_from_slice(&block[8..]);
        }
    }
    block.iter_mut().for_each(|b| *b = 0);

    if !bool::from(subtle::ConstantTimeEq::ct_eq(&a[..], &IV_3394[..])) {
        return Err(UnwrapError::InvalidIntegrityCheck);
    }

    Ok(registers)
}
