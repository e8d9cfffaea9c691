//! Tests running the savesync binary

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn savesync(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_savesync"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Working directory with `saves/`, `share/` and a config.json pointing at them.
fn setup() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("saves")).unwrap();
    fs::create_dir_all(tmp.path().join("share")).unwrap();
    fs::write(tmp.path().join("saves").join("a.txt"), b"hello").unwrap();
    fs::write(tmp.path().join("saves").join("b.txt.bak"), b"old").unwrap();

    let config = serde_json::json!({
        "save_dir": tmp.path().join("saves"),
        "share_path": tmp.path().join("share"),
        "hostname": "testhost",
    });
    fs::write(tmp.path().join("config.json"), config.to_string()).unwrap();
    tmp
}

fn share_files(tmp: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(tmp.path().join("share"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = savesync(tmp.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("config.json"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_sync_then_skip() {
    let tmp = setup();

    let output = savesync(tmp.path(), &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Created '"));
    assert!(out.contains("Created checksum file '"));
    assert!(out.contains("Moved files to '"));

    let files = share_files(&tmp);
    assert_eq!(files.len(), 2);
    assert!(files[0].starts_with("save_") && files[0].ends_with("_testhost.sha256"));
    assert!(files[1].ends_with("_testhost.zip"));

    let output = savesync(tmp.path(), &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Synchronization skipped - file with this hash already exists:"));
    assert!(out.contains("Deleted '"));
    assert_eq!(share_files(&tmp), files);
}

#[test]
fn test_missing_share_dir_fails_without_archive() {
    let tmp = setup();
    fs::remove_dir_all(tmp.path().join("share")).unwrap();

    let output = savesync(tmp.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("does not exist!"));

    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.ends_with(".zip"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_work_dir_not_a_directory_exits_with_two() {
    let tmp = setup();
    let config = serde_json::json!({
        "save_dir": tmp.path().join("saves"),
        "share_path": tmp.path().join("share"),
        "hostname": "testhost",
        "work_dir": tmp.path().join("saves").join("a.txt"),
    });
    fs::write(tmp.path().join("config.json"), config.to_string()).unwrap();

    let output = savesync(tmp.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("is not a directory!"));
    assert!(share_files(&tmp).is_empty());
}

#[test]
fn test_check_flag_does_not_sync() {
    let tmp = setup();

    let output = savesync(tmp.path(), &["--check"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Configuration OK."));
    assert!(share_files(&tmp).is_empty());
}

#[test]
fn test_explicit_config_path() {
    let tmp = setup();
    let elsewhere = TempDir::new().unwrap();

    let config = tmp.path().join("config.json");
    let output = savesync(elsewhere.path(), &["--config", config.to_str().unwrap(), "--check"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}
