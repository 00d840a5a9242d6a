//! Cached filename codec.
//!
//! Name encryption and directory-ID hashing are deterministic AES-SIV
//! operations, so their results can be memoized freely: eviction only costs
//! time, never correctness. Failures are not cached.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use tracing::trace;

use crate::crypto::Cryptor;
use crate::fs::name::{NameContext, NameError};

use super::config::CIPHERTEXT_SUFFIX;
use super::path::DirId;

/// Default maximum entries per cache.
pub const DEFAULT_CAPACITY: u64 = 1000;

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(20);

/// Sizing of the name caches.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCacheConfig {
    /// Maximum entries in each of the three caches
    pub capacity: u64,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl: Duration,
}

impl Default for NameCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Cache key: (directory_id, name)
type NameKey = (String, String);

/// Deterministic name and directory-ID translation with bounded memoization.
///
/// # Thread Safety
///
/// Moka caches are safe for concurrent use; share a codec via `Arc`.
pub struct NameCodec<C: Cryptor> {
    cryptor: Arc<C>,
    encrypted: Cache<NameKey, String>,
    decrypted: Cache<NameKey, String>,
    hashed: Cache<String, String>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: Cryptor> NameCodec<C> {
    pub fn new(cryptor: Arc<C>) -> Self {
        Self::with_config(cryptor, NameCacheConfig::default())
    }

    pub fn with_config(cryptor: Arc<C>, config: NameCacheConfig) -> Self {
        let build = || {
            Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(config.ttl)
                .build()
        };
        Self {
            cryptor,
            encrypted: build(),
            decrypted: build(),
            hashed: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(config.ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn cryptor(&self) -> &Arc<C> {
        &self.cryptor
    }

    /// Encrypt a cleartext name for a container in `dir_id`'s shard.
    ///
    /// Fails with [`NameError::NameTooLong`] when the container name (suffix
    /// included) would exceed the cryptor's limit.
    pub fn encrypt_name(&self, name: &str, dir_id: &DirId) -> Result<String, NameError> {
        let key = (dir_id.as_str().to_owned(), name.to_owned());
        if let Some(hit) = self.encrypted.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(dir_id = %dir_id, "Name encryption cache miss");

        let encrypted = self.cryptor.encrypt_filename(name, dir_id.as_str())?;
        let length = encrypted.len() + CIPHERTEXT_SUFFIX.len();
        let limit = self.cryptor.max_ciphertext_name_length();
        if length > limit {
            return Err(NameError::NameTooLong {
                length,
                limit,
                context: NameContext::new()
                    .with_cleartext_name(name)
                    .with_dir_id(dir_id.as_str()),
            });
        }

        self.encrypted.insert(key, encrypted.clone());
        Ok(encrypted)
    }

    /// Decrypt a container name (suffix already stripped).
    pub fn decrypt_name(&self, encrypted: &str, dir_id: &DirId) -> Result<String, NameError> {
        let key = (dir_id.as_str().to_owned(), encrypted.to_owned());
        if let Some(hit) = self.decrypted.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let name = self.cryptor.decrypt_filename(encrypted, dir_id.as_str())?;
        self.decrypted.insert(key, name.clone());
        Ok(name)
    }

    /// Hash a directory ID to the string its shard path is built from.
    pub fn hash_dir_id(&self, dir_id: &DirId) -> Result<String, NameError> {
        if let Some(hit) = self.hashed.get(dir_id.as_str()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(dir_id = %dir_id, "Directory hash cache miss");

        let hash = self.cryptor.hash_directory_id(dir_id.as_str())?;
        self.hashed.insert(dir_id.as_str().to_owned(), hash.clone());
        Ok(hash)
    }

    /// Counters and entry counts for diagnostics.
    pub fn stats(&self) -> CacheStats {
        self.encrypted.run_pending_tasks();
        self.decrypted.run_pending_tasks();
        self.hashed.run_pending_tasks();
        CacheStats {
            encrypted_name_entries: self.encrypted.entry_count(),
            decrypted_name_entries: self.decrypted.entry_count(),
            dir_hash_entries: self.hashed.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.encrypted.invalidate_all();
        self.decrypted.invalidate_all();
        self.hashed.invalidate_all();
    }
}

impl<C: Cryptor> fmt::Debug for NameCodec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameCodec")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub encrypted_name_entries: u64,
    pub decrypted_name_entries: u64,
    pub dir_hash_entries: u64,
    pub hits: u64,
    pub misses: u64,
}
