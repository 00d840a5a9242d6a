//! Benchmarks for random-access content I/O.
//!
//! Compares the three write strategies (replace, in-place, rotate) and
//! ranged reads on a vault in a temporary directory.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxvault_core::fs::content::AccessMode;
use oxvault_core::storage::LocalStorage;
use oxvault_core::vault::{DEFAULT_KEY_FILE_NAME, KdfConfig, UnlockedVault, VaultCreator, VaultPath};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;
use tempfile::TempDir;

const CHUNK: usize = 32 * 1024;

fn generate(size: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(12345);
    let mut data = vec![0u8; size];
    rng.fill(&mut data[..]);
    data
}

fn setup() -> (TempDir, UnlockedVault<LocalStorage>) {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path()).unwrap();
    let vault = VaultCreator::new(storage, DEFAULT_KEY_FILE_NAME)
        .with_kdf(KdfConfig::fast())
        .create(&mut b"bench".to_vec())
        .unwrap();
    (dir, vault)
}

fn write_file(vault: &UnlockedVault<LocalStorage>, name: &str, data: &[u8]) -> VaultPath {
    let access = vault.access();
    let entry = access.create_file(&VaultPath::root(), name).unwrap();
    let mut file = access.open_file(&entry.path, AccessMode::WRITE_TRUNCATE).unwrap();
    file.write(0, data).unwrap();
    file.close().unwrap();
    entry.path
}

fn bench_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_write");
    let (_dir, vault) = setup();

    let sizes = [("32KB", CHUNK), ("1MB", 1024 * 1024)];
    for (label, size) in sizes {
        let data = generate(size);
        let path = write_file(&vault, &format!("replace-{label}"), &data);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("replace", label), &data, |b, data| {
            b.iter(|| {
                let mut file = vault.access().open_file(&path, AccessMode::WRITE_TRUNCATE).unwrap();
                file.write(0, black_box(data)).unwrap();
            });
        });
    }

    let base = generate(1024 * 1024);
    let path = write_file(&vault, "in-place", &base);
    group.throughput(Throughput::Bytes(100));
    group.bench_function("in_place_100B", |b| {
        b.iter(|| {
            let mut file = vault.access().open_file(&path, AccessMode::READ_WRITE).unwrap();
            file.write(black_box(CHUNK as u64 + 7), &base[..100]).unwrap();
        });
    });

    group.bench_function("rotate_1MB_resize", |b| {
        b.iter(|| {
            let mut file = vault.access().open_file(&path, AccessMode::READ_WRITE).unwrap();
            file.set_len(black_box(base.len() as u64 + CHUNK as u64)).unwrap();
            file.set_len(base.len() as u64).unwrap();
        });
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_read");
    let (_dir, vault) = setup();
    let path = write_file(&vault, "read", &generate(4 * 1024 * 1024));
    let file = vault.access().open_file(&path, AccessMode::READ).unwrap();

    for len in [4096usize, CHUNK, 1024 * 1024] {
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("ranged", len), &len, |b, &len| {
            b.iter(|| file.read(black_box(CHUNK as u64 - 100), len).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_writes, bench_reads);
criterion_main!(benches);
