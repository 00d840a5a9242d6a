#![allow(deprecated)] // assert_cmd 2.1 deprecates cargo_bin without a stable replacement
//! End-to-end runs of the `oxvault` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PASSWORD: &str = "correct horse battery staple";

fn oxvault() -> Command {
    let mut cmd = Command::cargo_bin("oxvault").unwrap();
    cmd.env("OXVAULT_FAST_KDF", "1")
        .env("OXVAULT_PASSWORD", PASSWORD)
        .env_remove("OXVAULT_KEY_FILE")
        .env_remove("RUST_LOG");
    cmd
}

fn init_vault() -> TempDir {
    let temp = TempDir::new().unwrap();
    oxvault().arg("init").arg(temp.path()).assert().success();
    temp
}

#[test]
fn write_then_cat_round_trips() {
    let vault = init_vault();

    oxvault()
        .args(["write", vault.path().to_str().unwrap(), "/hello.txt", "--truncate"])
        .write_stdin("hello vault\n")
        .assert()
        .success();

    oxvault()
        .args(["cat", vault.path().to_str().unwrap(), "/hello.txt"])
        .assert()
        .success()
        .stdout("hello vault\n");
}

#[test]
fn ls_shows_directories_with_a_slash() {
    let vault = init_vault();
    let path = vault.path().to_str().unwrap();

    oxvault().args(["mkdir", path, "/docs/inner", "-p"]).assert().success();
    oxvault().args(["touch", path, "/docs/a.txt"]).assert().success();

    oxvault()
        .args(["ls", path, "/docs"])
        .assert()
        .success()
        .stdout("inner/\na.txt\n");
}

#[test]
fn ls_json_lists_entries() {
    let vault = init_vault();
    let path = vault.path().to_str().unwrap();
    oxvault().args(["touch", path, "/note"]).assert().success();

    let output = oxvault().args(["ls", path, "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["entries"][0]["name"], "note");
    assert_eq!(json["entries"][0]["type"], "file");
    assert_eq!(json["entries"][0]["size"], 0);
}

#[test]
fn wrong_password_exits_with_auth_failure() {
    let vault = init_vault();
    oxvault()
        .env("OXVAULT_PASSWORD", "wrong")
        .args(["ls", vault.path().to_str().unwrap()])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("passphrase"));
}

#[test]
fn missing_file_exits_with_not_found() {
    let vault = init_vault();
    oxvault()
        .args(["cat", vault.path().to_str().unwrap(), "/absent"])
        .assert()
        .code(3);
}

#[test]
fn init_refuses_non_empty_directory_without_force() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("keep.txt"), b"mine").unwrap();

    oxvault().arg("init").arg(temp.path()).assert().failure();
    assert!(temp.path().join("keep.txt").exists());

    oxvault()
        .arg("init")
        .arg(temp.path())
        .arg("--force")
        .assert()
        .success();
    assert!(!temp.path().join("keep.txt").exists());
}

#[test]
fn passwd_switches_the_passphrase() {
    let vault = init_vault();
    let path = vault.path().to_str().unwrap();

    oxvault()
        .args(["passwd", path])
        .env("OXVAULT_NEW_PASSWORD", "new secret")
        .assert()
        .success();

    oxvault().args(["ls", path]).assert().code(4);
    oxvault()
        .env("OXVAULT_PASSWORD", "new secret")
        .args(["ls", path])
        .assert()
        .success();
    assert!(vault.path().join("masterkey.cryptomator.bkup").exists());
}

#[test]
fn info_reads_the_key_file_without_a_passphrase() {
    let vault = init_vault();
    oxvault()
        .env_remove("OXVAULT_PASSWORD")
        .args(["info", vault.path().to_str().unwrap(), "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"format\": 7"));
}
