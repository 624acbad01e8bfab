//! End-to-end tests of the `tombstone` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const USERS: &str = "CREATE TABLE dbo.users (\n    id INT NOT NULL PRIMARY KEY,\n    is_active BIT NOT NULL,\n    updated_at DATETIME2 NULL\n)\n";
const ORDERS: &str = "CREATE TABLE dbo.orders (\n    id INT NOT NULL PRIMARY KEY,\n    user_id INT NOT NULL REFERENCES dbo.users (id),\n    is_active BIT NOT NULL,\n    updated_at DATETIME2 NULL\n)\n";

fn tombstone(args: &[&str], root: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tombstone"))
        .args(args)
        .arg(root)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn setup(root: &Path) {
    fs::write(root.join("users.sql"), USERS).unwrap();
    fs::write(root.join("orders.sql"), ORDERS).unwrap();
}

#[test]
fn test_generate_then_check() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let check = tombstone(&["check"], dir.path());
    assert_eq!(check.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&check.stdout).contains("vw_users.sql: missing"));
    assert!(!dir.path().join("generated").exists());

    let generate = tombstone(&["generate"], dir.path());
    assert_eq!(generate.status.code(), Some(0), "{}", stderr(&generate));
    assert!(dir
        .path()
        .join("generated")
        .join("trg_users_cascade_soft_delete.sql")
        .is_file());
    assert!(dir
        .path()
        .join("generated")
        .join("tombstone.manifest.json")
        .is_file());

    let check = tombstone(&["check"], dir.path());
    assert_eq!(check.status.code(), Some(0), "{}", stderr(&check));
    assert!(check.stdout.is_empty());
}

#[test]
fn test_error_diagnostics_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    fs::write(
        dir.path().join("broken.sql"),
        "CREATE TABLE dbo.lines (id INT PRIMARY KEY, order_id INT REFERENCES dbo.missing (id), is_active BIT)\n",
    )
    .unwrap();

    let output = tombstone(&["generate"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("broken.sql(1,"));
    assert!(stderr(&output).contains(": error ST3003: "));
    // Unaffected tables still generate.
    assert!(dir.path().join("generated").join("vw_users.sql").is_file());
}

#[test]
fn test_warnings_do_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("tags.sql"),
        "-- @owner platform\nCREATE TABLE dbo.tags (id INT PRIMARY KEY, is_active BIT NOT NULL, updated_at DATETIME2)\n",
    )
    .unwrap();

    let output = tombstone(&["generate"], dir.path());
    assert_eq!(output.status.code(), Some(0));
    assert!(stderr(&output).contains("tags.sql(1,4): warning ST1001: "));
}

#[test]
fn test_bad_config_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    fs::write(dir.path().join("tombstone.toml"), "retention = 5\n").unwrap();

    let output = tombstone(&["generate"], dir.path());
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("tombstone: error: "));
}

#[test]
fn test_refuses_to_overwrite_hand_written_file() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());
    fs::create_dir_all(dir.path().join("generated")).unwrap();
    fs::write(
        dir.path().join("generated").join("trg_users_cascade_soft_delete.sql"),
        "-- mine, but not a parsable trigger\nSELECT 1\n",
    )
    .unwrap();

    let output = tombstone(&["generate"], dir.path());
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(
        fs::read_to_string(
            dir.path()
                .join("generated")
                .join("trg_users_cascade_soft_delete.sql")
        )
        .unwrap(),
        "-- mine, but not a parsable trigger\nSELECT 1\n"
    );
}
