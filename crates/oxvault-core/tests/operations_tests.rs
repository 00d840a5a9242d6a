//! Path resolution and entry operations on a real vault layout.

mod common;

use common::TestVault;
use oxvault_core::fs::content::AccessMode;
use oxvault_core::fs::name::NameError;
use oxvault_core::vault::{EntryType, NewEntry, VaultFlags, VaultOperationError, VaultPath};
use proptest::prelude::*;

fn names(vault: &TestVault, path: &VaultPath) -> Vec<String> {
    vault
        .access()
        .list(path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.unwrap().name().to_string())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[test]
fn fresh_vault_root_is_empty() {
    let vault = TestVault::new();
    assert!(vault.access().list(&VaultPath::root()).unwrap().is_empty());
}

#[test]
fn nested_directories_resolve() {
    let vault = TestVault::new();
    let access = vault.access();
    let a = access.create_directory(&VaultPath::root(), "a").unwrap();
    let b = access.create_directory(&a.path, "b").unwrap();
    access.create_file(&b.path, "leaf.txt").unwrap();

    let leaf = access.resolve(&VaultPath::new("/a/b/leaf.txt")).unwrap();
    assert_eq!(leaf.kind, EntryType::File);
    assert_eq!(leaf.parent_dir_id, b.dir_id.clone().unwrap());
    assert_eq!(names(&vault, &VaultPath::new("a/b")), ["leaf.txt"]);
    assert_eq!(vault.shard_count(), 3);
}

#[test]
fn missing_and_mistyped_paths() {
    let vault = TestVault::new();
    let access = vault.access();
    vault.file_with("file.txt", b"x");

    assert!(matches!(
        access.resolve(&VaultPath::new("nope")),
        Err(VaultOperationError::NotFound { .. })
    ));
    assert!(matches!(
        access.resolve(&VaultPath::new("file.txt/child")),
        Err(VaultOperationError::NotADirectory { .. })
    ));
    let dir = access.create_directory(&VaultPath::root(), "dir").unwrap();
    assert!(matches!(
        access.open_file(&dir.path, AccessMode::READ),
        Err(VaultOperationError::NotAFile { .. })
    ));
}

#[test]
fn duplicate_creation_is_refused() {
    let vault = TestVault::new();
    let access = vault.access();
    access.create_file(&VaultPath::root(), "same").unwrap();
    assert!(matches!(
        access.create_directory(&VaultPath::root(), "same"),
        Err(VaultOperationError::EntryAlreadyExists { .. })
    ));
}

#[test]
fn unique_creation_uses_alternative_names() {
    let vault = TestVault::new();
    let access = vault.access();
    let root = VaultPath::root();

    let first = access.create_unique(&root, "a.txt", NewEntry::File).unwrap();
    let second = access.create_unique(&root, "a.txt", NewEntry::File).unwrap();
    let third = access.create_unique(&root, "a (1).txt", NewEntry::File).unwrap();
    let dir = access.create_unique(&root, "README", NewEntry::Directory).unwrap();
    let dir2 = access.create_unique(&root, "README", NewEntry::Directory).unwrap();

    assert_eq!(first.name(), "a.txt");
    assert_eq!(second.name(), "a (1).txt");
    assert_eq!(third.name(), "a (2).txt");
    assert_eq!(dir.name(), "README");
    assert_eq!(dir2.name(), "README (1)");
}

#[test]
fn rename_keeps_content_and_directory_ids() {
    let vault = TestVault::new();
    let access = vault.access();
    let dir = access.create_directory(&VaultPath::root(), "before").unwrap();
    access.create_file(&dir.path, "inner.txt").unwrap();

    let renamed = access.rename(&dir.path, "after").unwrap();
    assert_eq!(renamed.dir_id, dir.dir_id);
    assert_eq!(names(&vault, &VaultPath::root()), ["after"]);
    assert_eq!(names(&vault, &VaultPath::new("after")), ["inner.txt"]);

    vault.file_with("taken", b"");
    assert!(matches!(
        access.rename(&renamed.path, "taken"),
        Err(VaultOperationError::EntryAlreadyExists { .. })
    ));
}

#[test]
fn recursive_delete_removes_shards() {
    let vault = TestVault::new();
    let access = vault.access();
    let top = access.create_directory(&VaultPath::root(), "top").unwrap();
    let mid = access.create_directory(&top.path, "mid").unwrap();
    access.create_directory(&mid.path, "bottom").unwrap();
    access.create_file(&mid.path, "f1").unwrap();
    access.create_file(&top.path, "f2").unwrap();
    assert_eq!(vault.shard_count(), 4);

    let stats = access.delete(&top.path).unwrap();
    assert_eq!(stats.files_deleted, 2);
    assert_eq!(stats.directories_deleted, 3);
    assert_eq!(vault.shard_count(), 1);
    assert!(access.list(&VaultPath::root()).unwrap().is_empty());

    assert!(matches!(
        access.delete(&VaultPath::root()),
        Err(VaultOperationError::RootOperation { .. })
    ));
}

#[test]
fn corrupt_entry_is_reported_individually() {
    let vault = TestVault::new();
    vault.file_with("good.txt", b"fine");
    let shard = vault.access().shard(&oxvault_core::vault::DirId::root()).unwrap();
    std::fs::write(
        vault.dir.path().join(shard.as_str()).join("bm90IGEgbmFtZQ==.c9r"),
        b"",
    )
    .unwrap();

    let listing = vault.access().list(&VaultPath::root()).unwrap();
    assert_eq!(listing.len(), 2);
    let (ok, err): (Vec<_>, Vec<_>) = listing.into_iter().partition(Result::is_ok);
    assert_eq!(ok[0].as_ref().unwrap().name(), "good.txt");
    assert!(matches!(
        err[0].as_ref().unwrap_err().source,
        VaultOperationError::Name(NameError::DecryptionFailed { .. })
    ));
}

#[test]
fn non_ascii_corrupt_name_is_reported_with_warnings_enabled() {
    let vault = TestVault::new();
    vault.file_with("good.txt", b"fine");
    let shard = vault.access().shard(&oxvault_core::vault::DirId::root()).unwrap();
    let corrupt = format!("{}.c9r", "\u{e9}".repeat(30));
    std::fs::write(vault.dir.path().join(shard.as_str()).join(&corrupt), b"").unwrap();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .finish();
    let listing = tracing::subscriber::with_default(subscriber, || {
        vault.access().list(&VaultPath::root()).unwrap()
    });

    assert_eq!(listing.len(), 2);
    let errors: Vec<String> = listing
        .iter()
        .filter_map(|entry| entry.as_ref().err())
        .map(ToString::to_string)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains('\u{e9}'));
}

#[test]
fn non_ascii_directory_marker_is_invalid() {
    let vault = TestVault::new();
    let dir = vault
        .access()
        .create_directory(&VaultPath::root(), "docs")
        .unwrap();
    std::fs::write(
        vault.dir.path().join(dir.container.as_str()).join("dir.c9r"),
        "a\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}",
    )
    .unwrap();

    let err = vault
        .access()
        .resolve(&VaultPath::new("docs/missing.txt"))
        .unwrap_err();
    assert!(matches!(err, VaultOperationError::InvalidDirectoryMarker { .. }));
    assert!(err.to_string().contains("not ASCII"));
}

#[test]
fn missing_directory_marker() {
    let vault = TestVault::new();
    let dir = vault
        .access()
        .create_directory(&VaultPath::root(), "broken")
        .unwrap();
    std::fs::remove_file(vault.dir.path().join(dir.container.as_str()).join("dir.c9r")).unwrap();

    assert!(matches!(
        vault.access().resolve(&dir.path),
        Err(VaultOperationError::MissingDirectoryMarker { .. })
    ));
}

#[test]
fn overlong_names_are_rejected() {
    let vault = TestVault::new();
    let result = vault
        .access()
        .create_file(&VaultPath::root(), &"n".repeat(200));
    assert!(matches!(
        result,
        Err(VaultOperationError::Name(NameError::NameTooLong { .. }))
    ));
}

#[test]
fn read_only_vault_refuses_mutation() {
    let vault = TestVault::new();
    let path = vault.file_with("keep.txt", b"data");
    let storage = oxvault_core::storage::LocalStorage::new(vault.dir.path()).unwrap();
    let read_only = oxvault_core::vault::VaultAccess::new(std::sync::Arc::clone(vault.vault.cryptor()), storage)
        .with_flags(VaultFlags {
            read_only: true,
            auto_lock: false,
        });

    assert!(matches!(
        read_only.delete(&path),
        Err(VaultOperationError::ReadOnly { .. })
    ));
    assert!(matches!(
        read_only.open_file(&path, AccessMode::READ_WRITE),
        Err(VaultOperationError::ReadOnly { .. })
    ));
    assert_eq!(read_only.file_size(&path).unwrap(), 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn created_names_list_back(name in "[a-zA-Z0-9 _.-]{1,60}") {
        prop_assume!(name != "." && name != ".." && name.trim() == name);
        let vault = TestVault::new();
        vault.access().create_file(&VaultPath::root(), &name).unwrap();
        prop_assert_eq!(names(&vault, &VaultPath::root()), vec![name]);
    }
}
