#![forbid(unsafe_code)]

//! The key file: master keys wrapped under a passphrase-derived KEK.

use rand::RngCore;
use ring::hmac;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{CryptoError, MasterKey, key_wrap};

use super::config::VAULT_VERSION;

/// Salt length written to new key files.
pub const DEFAULT_SCRYPT_SALT_LENGTH: usize = 8;

/// N = 2^15
pub const DEFAULT_SCRYPT_COST_LOG2: u8 = 15;

pub const DEFAULT_SCRYPT_BLOCK_SIZE: u32 = 8;

const SCRYPT_PARALLELIZATION: u32 = 1;

/// N = 2^10, for tests and development only.
pub const FAST_SCRYPT_COST_LOG2: u8 = 10;

/// Setting this to `1` or `true` selects [`FAST_SCRYPT_COST_LOG2`] by default.
pub const FAST_KDF_ENV: &str = "OXVAULT_FAST_KDF";

#[inline]
fn is_fast_kdf_enabled() -> bool {
    std::env::var(FAST_KDF_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Scrypt parameters used when writing a key file.
///
/// Reading always uses the parameters stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    pub scrypt_cost_log2: u8,
    pub scrypt_block_size: u32,
}

impl KdfConfig {
    pub const fn standard() -> Self {
        Self {
            scrypt_cost_log2: DEFAULT_SCRYPT_COST_LOG2,
            scrypt_block_size: DEFAULT_SCRYPT_BLOCK_SIZE,
        }
    }

    /// **WARNING**: weak parameters, never for real vaults.
    pub const fn fast() -> Self {
        Self {
            scrypt_cost_log2: FAST_SCRYPT_COST_LOG2,
            scrypt_block_size: DEFAULT_SCRYPT_BLOCK_SIZE,
        }
    }
}

impl Default for KdfConfig {
    /// Standard parameters unless `OXVAULT_FAST_KDF` is set.
    fn default() -> Self {
        if is_fast_kdf_enabled() {
            Self::fast()
        } else {
            Self::standard()
        }
    }
}

/// The key file format.
///
/// Holds both master keys wrapped (RFC 3394) under a KEK derived with
/// `scrypt(NFC(passphrase), salt || pepper)`, plus an HMAC over the version
/// so the version field cannot be swapped without the MAC key.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterKeyFile {
    pub version: u32,

    #[serde_as(as = "Base64")]
    pub scrypt_salt: Vec<u8>,

    /// Scrypt cost parameter N (a power of two).
    pub scrypt_cost_param: i32,

    /// Scrypt block size parameter r.
    pub scrypt_block_size: i32,

    /// Wrapped AES master key.
    #[serde_as(as = "Base64")]
    pub primary_master_key: Vec<u8>,

    /// Wrapped MAC master key.
    #[serde_as(as = "Base64")]
    pub hmac_master_key: Vec<u8>,

    /// HMAC-SHA256 of the version as a big-endian u32.
    #[serde_as(as = "Base64")]
    pub version_mac: Vec<u8>,
}

impl MasterKeyFile {
    /// Wrap `master_key` under a KEK derived from `passphrase` and `pepper`.
    pub fn create(
        master_key: &MasterKey,
        passphrase: &str,
        pepper: &[u8],
        kdf: KdfConfig,
    ) -> Result<Self, CryptoError> {
        let mut salt = vec![0u8; DEFAULT_SCRYPT_SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);

        let kek = derive_kek(
            passphrase,
            &salt,
            pepper,
            kdf.scrypt_cost_log2,
            kdf.scrypt_block_size,
        )?;

        // AES key first, then MAC key
        let primary_master_key =
            master_key.with_aes_key(|key| key_wrap::wrap_key(key, kek.expose_secret()))??;
        let hmac_master_key =
            master_key.with_mac_key(|key| key_wrap::wrap_key(key, kek.expose_secret()))??;
        let version_mac = master_key.with_mac_key(|key| {
            let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, key);
            hmac::sign(&hmac_key, &VAULT_VERSION.to_be_bytes())
                .as_ref()
                .to_vec()
        })?;

        debug!(
            scrypt_cost_log2 = kdf.scrypt_cost_log2,
            "Created key file material"
        );
        Ok(Self {
            version: VAULT_VERSION,
            scrypt_salt: salt,
            scrypt_cost_param: 1i32 << kdf.scrypt_cost_log2,
            scrypt_block_size: kdf.scrypt_block_size as i32,
            primary_master_key,
            hmac_master_key,
            version_mac,
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Derive the KEK and unwrap both master keys, then check the version MAC.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidScryptParams`: stored parameters are unusable
    /// - `CryptoError::KeyUnwrapIntegrityFailed`: wrong passphrase or pepper,
    ///   or a tampered key file
    /// - `CryptoError::HmacVerificationFailed`: **[INTEGRITY VIOLATION]** the
    ///   version field does not match its MAC
    pub fn unlock(&self, passphrase: &str, pepper: &[u8]) -> Result<MasterKey, CryptoError> {
        let (log2_n, r) = self.scrypt_params()?;
        let kek = derive_kek(passphrase, &self.scrypt_salt, pepper, log2_n, r)?;

        let mut aes_key = unwrap_32(&self.primary_master_key, kek.expose_secret())?;
        let mut mac_key = unwrap_32(&self.hmac_master_key, kek.expose_secret())?;

        let checked = self.check_version_mac(&mac_key);
        let key = checked.and_then(|()| MasterKey::new(aes_key, mac_key).map_err(CryptoError::from));
        aes_key.zeroize();
        mac_key.zeroize();
        key
    }

    /// Same master keys, wrapped under a new passphrase and fresh salt.
    pub fn rewrap(
        &self,
        old_passphrase: &str,
        new_passphrase: &str,
        pepper: &[u8],
        kdf: KdfConfig,
    ) -> Result<Self, CryptoError> {
        let master_key = self.unlock(old_passphrase, pepper)?;
        Self::create(&master_key, new_passphrase, pepper, kdf)
    }

    fn scrypt_params(&self) -> Result<(u8, u32), CryptoError> {
        let n = self.scrypt_cost_param;
        if n < 2 || n.count_ones() != 1 {
            return Err(CryptoError::InvalidScryptParams(format!(
                "cost parameter {n} is not a power of two"
            )));
        }
        let r = u32::try_from(self.scrypt_block_size).map_err(|_| {
            CryptoError::InvalidScryptParams(format!(
                "block size {} is negative",
                self.scrypt_block_size
            ))
        })?;
        Ok((n.trailing_zeros() as u8, r))
    }

    fn check_version_mac(&self, mac_key: &[u8; 32]) -> Result<(), CryptoError> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
        hmac::verify(&key, &self.version.to_be_bytes(), &self.version_mac)
            .map_err(|_| CryptoError::HmacVerificationFailed)
    }
}

fn derive_kek(
    passphrase: &str,
    salt: &[u8],
    pepper: &[u8],
    log2_n: u8,
    r: u32,
) -> Result<SecretBox<[u8; 32]>, CryptoError> {
    let normalized = Zeroizing::new(passphrase.nfc().collect::<String>());
    let params = scrypt::Params::new(log2_n, r, SCRYPT_PARALLELIZATION, 32).map_err(|e| {
        CryptoError::InvalidScryptParams(format!(
            "N=2^{log2_n}, r={r}, p={SCRYPT_PARALLELIZATION}: {e}"
        ))
    })?;

    let mut salt_and_pepper = Zeroizing::new(Vec::with_capacity(salt.len() + pepper.len()));
    salt_and_pepper.extend_from_slice(salt);
    salt_and_pepper.extend_from_slice(pepper);

    let mut kek = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(normalized.as_bytes(), &salt_and_pepper, &params, &mut kek[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(SecretBox::new(Box::new(*kek)))
}

fn unwrap_32(wrapped: &[u8], kek: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
    let key = key_wrap::unwrap_key(wrapped, kek)?;
    key.as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: key.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_key() -> MasterKey {
        MasterKey::new([0x11; 32], [0x22; 32]).unwrap()
    }

    #[test]
    fn create_then_unlock() {
        let file = MasterKeyFile::create(&fixed_key(), "pass", b"", KdfConfig::fast()).unwrap();
        assert_eq!(file.version, 7);
        assert_eq!(file.scrypt_cost_param, 1024);
        assert_eq!(file.scrypt_salt.len(), 8);

        let key = file.unlock("pass", b"").unwrap();
        assert_eq!(key.with_aes_key(|k| *k).unwrap(), [0x11; 32]);
        assert_eq!(key.with_mac_key(|k| *k).unwrap(), [0x22; 32]);
    }

    #[test]
    fn json_field_names() {
        let file = MasterKeyFile::create(&fixed_key(), "pass", b"", KdfConfig::fast()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&file.to_json().unwrap()).unwrap();
        for field in [
            "version",
            "scryptSalt",
            "scryptCostParam",
            "scryptBlockSize",
            "primaryMasterKey",
            "hmacMasterKey",
            "versionMac",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        let back = MasterKeyFile::from_json(file.to_json().unwrap().as_bytes()).unwrap();
        assert!(back.unlock("pass", b"").is_ok());
    }

    #[test]
    fn wrong_passphrase_or_pepper_fails_unwrap() {
        let file = MasterKeyFile::create(&fixed_key(), "pass", b"pepper", KdfConfig::fast()).unwrap();
        assert!(matches!(
            file.unlock("wrong", b"pepper"),
            Err(CryptoError::KeyUnwrapIntegrityFailed)
        ));
        assert!(matches!(
            file.unlock("pass", b""),
            Err(CryptoError::KeyUnwrapIntegrityFailed)
        ));
    }

    #[test]
    fn nfd_passphrase_matches_nfc() {
        let file = MasterKeyFile::create(&fixed_key(), "caf\u{e9}", b"", KdfConfig::fast()).unwrap();
        assert!(file.unlock("cafe\u{0301}", b"").is_ok());
    }

    #[test]
    fn tampered_version_fails_mac() {
        let mut file = MasterKeyFile::create(&fixed_key(), "pass", b"", KdfConfig::fast()).unwrap();
        file.version = 8;
        assert!(matches!(
            file.unlock("pass", b""),
            Err(CryptoError::HmacVerificationFailed)
        ));
    }

    #[test]
    fn rewrap_keeps_keys() {
        let file = MasterKeyFile::create(&fixed_key(), "old", b"", KdfConfig::fast()).unwrap();
        let rewrapped = file.rewrap("old", "new", b"", KdfConfig::fast()).unwrap();
        assert_ne!(rewrapped.scrypt_salt, file.scrypt_salt);
        assert!(rewrapped.unlock("old", b"").is_err());
        let key = rewrapped.unlock("new", b"").unwrap();
        assert_eq!(key.with_aes_key(|k| *k).unwrap(), [0x11; 32]);
    }

    #[test]
    fn bad_scrypt_params_are_rejected() {
        let mut file = MasterKeyFile::create(&fixed_key(), "pass", b"", KdfConfig::fast()).unwrap();
        file.scrypt_cost_param = 1000;
        assert!(matches!(
            file.unlock("pass", b""),
            Err(CryptoError::InvalidScryptParams(_))
        ));
    }
}
