//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use oxvault_core::crypto::SivCtrMacCryptor;
use oxvault_core::fs::content::AccessMode;
use oxvault_core::storage::LocalStorage;
use oxvault_core::vault::{
    DEFAULT_KEY_FILE_NAME, KdfConfig, UnlockedVault, VaultAccess, VaultCreator, VaultPath,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub const PASSPHRASE: &str = "correct horse battery staple";

/// Cleartext chunk size of format 7 vaults.
pub const CHUNK: usize = 32 * 1024;

/// A freshly created vault in a temporary container.
pub struct TestVault {
    pub dir: TempDir,
    pub vault: UnlockedVault<LocalStorage>,
}

/// Route `RUST_LOG`-filtered logs through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestVault {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let mut passphrase = PASSPHRASE.as_bytes().to_vec();
        let vault = VaultCreator::new(storage, DEFAULT_KEY_FILE_NAME)
            .with_kdf(KdfConfig::fast())
            .create(&mut passphrase)
            .unwrap();
        Self { dir, vault }
    }

    pub fn access(&self) -> &VaultAccess<SivCtrMacCryptor, LocalStorage> {
        self.vault.access()
    }

    /// Create `name` in the root and fill it with `content`.
    pub fn file_with(&self, name: &str, content: &[u8]) -> VaultPath {
        let access = self.access();
        let entry = access.create_file(&VaultPath::root(), name).unwrap();
        let mut file = access.open_file(&entry.path, AccessMode::WRITE_TRUNCATE).unwrap();
        file.write(0, content).unwrap();
        file.close().unwrap();
        entry.path
    }

    pub fn read_all(&self, path: &VaultPath) -> Vec<u8> {
        let file = self.access().open_file(path, AccessMode::READ).unwrap();
        let size = file.size().unwrap();
        file.read(0, size as usize).unwrap()
    }

    /// Raw ciphertext of the container behind `path`.
    pub fn ciphertext(&self, path: &VaultPath) -> Vec<u8> {
        let entry = self.access().resolve(path).unwrap();
        std::fs::read(self.dir.path().join(entry.container.as_str())).unwrap()
    }

    /// Number of shard directories below `d/`.
    pub fn shard_count(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("d"))
            .unwrap()
            .map(|prefix| std::fs::read_dir(prefix.unwrap().path()).unwrap().count())
            .sum()
    }
}

/// Deterministic pseudo-random content.
pub fn content(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}
