//! CLI integration tests.
//!
//! Tests:
//! - Help and version output
//! - Row commands against a temporary data directory
//! - Filter fields are validated before they reach SQL
//! - Settings lifecycle for one user

mod common;

use common::TestFixture;
use serde_json::Value;
use std::process::{Command, Output};

fn dealflow(fixture: &TestFixture, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dealflow"))
        .args(["--data-dir", fixture.data_dir_str()])
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("DEALFLOW_USER")
        .output()
        .expect("failed to run dealflow")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json_stdout(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_cli_help_output() {
    let output = Command::new(env!("CARGO_BIN_EXE_dealflow"))
        .arg("--help")
        .output()
        .expect("failed to run");
    let help = stdout(&output);

    for expected in ["--data-dir", "--user", "--output", "rows", "settings"] {
        assert!(help.contains(expected), "help should mention {expected}");
    }
}

#[test]
fn test_cli_version_output() {
    let output = Command::new(env!("CARGO_BIN_EXE_dealflow"))
        .arg("--version")
        .output()
        .expect("failed to run");

    assert!(
        stdout(&output).contains(env!("CARGO_PKG_VERSION")),
        "version output should contain version number"
    );
}

#[test]
fn test_row_commands() {
    let fixture = TestFixture::new();

    let added = json_stdout(&dealflow(
        &fixture,
        &["-o", "json", "add", "leads", r#"{"company":"Acme","status":"new"}"#],
    ));
    let id = added["id"].as_str().unwrap().to_string();
    dealflow(
        &fixture,
        &["add", "leads", r#"{"company":"Globex","status":"won"}"#],
    );

    let listed = json_stdout(&dealflow(
        &fixture,
        &["-o", "json", "rows", "leads", "--where", "status=new"],
    ));
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["rows"][0]["company"], "Acme");

    let updated = json_stdout(&dealflow(
        &fixture,
        &["-o", "json", "update", "leads", &id, r#"{"status":"won"}"#],
    ));
    assert_eq!(updated["status"], "won");

    let removed = json_stdout(&dealflow(&fixture, &["-o", "json", "remove", "leads", &id]));
    assert_eq!(removed["removed"][0], id.as_str());

    let missing = dealflow(&fixture, &["remove", "leads", &id]);
    assert!(!missing.status.success());
    assert!(stdout(&missing).contains("Not found"));

    let listed = json_stdout(&dealflow(&fixture, &["-o", "json", "rows", "leads"]));
    assert_eq!(listed["total"], 1);
}

#[test]
fn test_invalid_row_json_fails() {
    let fixture = TestFixture::new();
    let output = dealflow(&fixture, &["add", "leads", "[1, 2]"]);
    assert!(!output.status.success());
}

#[test]
fn test_rows_rejects_quoted_filter_field() {
    let fixture = TestFixture::new();
    dealflow(&fixture, &["add", "secrets", r#"{"token":"hunter2"}"#]);

    let output = dealflow(&fixture, &["-o", "json", "rows", "leads", "--where", r#"a"b=1"#]);
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("hunter2"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid field name"));
}

#[test]
fn test_settings_lifecycle() {
    let fixture = TestFixture::new();

    let empty = json_stdout(&dealflow(&fixture, &["-o", "json", "settings", "get"]));
    assert_eq!(empty, Value::Null);

    let row = json_stdout(&dealflow(
        &fixture,
        &["--user", "ann", "-o", "json", "settings", "set", "theme", "dark"],
    ));
    assert_eq!(row["theme"], "dark");
    assert_eq!(row["userId"], "ann");
    assert_eq!(row["language"], "en");

    let theme = dealflow(&fixture, &["--user", "ann", "settings", "get", "theme"]);
    assert_eq!(stdout(&theme).trim(), "\"dark\"");

    let row = json_stdout(&dealflow(
        &fixture,
        &["--user", "ann", "-o", "json", "settings", "reset"],
    ));
    assert_eq!(row["theme"], "light");

    let deleted = dealflow(&fixture, &["--user", "ann", "settings", "delete"]);
    assert!(deleted.status.success());
    let again = dealflow(&fixture, &["--user", "ann", "settings", "delete"]);
    assert!(!again.status.success());
}

#[test]
fn test_window_command() {
    let fixture = TestFixture::new();
    for i in 0..30 {
        dealflow(&fixture, &["add", "deals", &format!(r#"{{"rank":{i}}}"#)]);
    }

    let window = json_stdout(&dealflow(
        &fixture,
        &[
            "-o",
            "json",
            "window",
            "deals",
            "--scroll-top",
            "500",
            "--item-height",
            "50",
            "--container-height",
            "200",
            "--overscan",
            "1",
        ],
    ));
    assert_eq!(window["total_items"], 30);
    assert_eq!(window["range"]["start"], 9);
    // Item 15 is the first whose top (750) is below the viewport (700).
    assert_eq!(window["range"]["end"], 16);
    assert_eq!(window["visible"].as_array().unwrap().len(), 8);
}

#[test]
fn test_cache_stats_command() {
    let fixture = TestFixture::new();
    dealflow(&fixture, &["add", "leads", r#"{"company":"Acme"}"#]);

    let stats = json_stdout(&dealflow(
        &fixture,
        &["-o", "json", "cache-stats", "leads", "deals"],
    ));
    assert_eq!(stats["stats"]["entry_count"], 2);
    assert_eq!(stats["cached"].as_array().unwrap().len(), 2);
    assert!(stats["stats"]["cache_size"].as_u64().unwrap() > 0);
}
