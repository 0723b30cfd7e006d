//! CLI regression tests for the `weir` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes, and output formats.
//!
//! Run with: `cargo test -p weir-test`
//! Requires the `weir` binary to be built first (`cargo build -p weir`).

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

use crate::emission::fixture;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `weir` binary.
fn weir() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("weir").expect("weir binary not found, run `cargo build -p weir` first")
}

// ---------------------------------------------------------------------------
// weir emit
// ---------------------------------------------------------------------------

#[test]
fn emit_prints_yaml_to_stdout() {
    weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .assert()
        .success()
        .stdout(contains("asyncapi:"))
        .stdout(contains("3.0.0"))
        .stdout(contains("publishuserevent"));
}

#[test]
fn emit_json_format_outputs_valid_json() {
    let output = weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .args(["--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let s = String::from_utf8(output).expect("stdout should be valid UTF-8");
    let v: serde_json::Value = serde_json::from_str(&s).expect("--format json output should be JSON");
    assert_eq!(v["asyncapi"], "3.0.0");
    assert_eq!(v["info"]["title"], "Acme Events");
}

#[test]
fn emit_writes_output_file_in_extension_format() {
    let tmp = TempDir::new().expect("temp dir");
    let out = tmp.path().join("nested/asyncapi.json");

    weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout("");

    let content = std::fs::read_to_string(&out).expect("output written");
    let v: serde_json::Value = serde_json::from_str(&content).expect("extension selects JSON");
    assert!(v["channels"]["orders"].is_object());
}

#[test]
fn emit_with_config_file() {
    weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .arg("--config")
        .arg(fixture("weir.yaml"))
        .assert()
        .success()
        // config selects JSON and keys schemes by name
        .stdout(contains("\"partnerOAuth\""));
}

#[test]
fn emit_missing_source_flag_exits_two() {
    weir().args(["emit"]).assert().failure().code(2);
}

#[test]
fn emit_nonexistent_source_exits_one() {
    weir()
        .args(["emit", "--source", "does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("not found"));
}

#[test]
fn emit_invalid_program_exits_one() {
    weir()
        .args(["emit", "--source"])
        .arg(fixture("invalid-program.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2002"));
}

#[test]
fn emit_unknown_format_exits_one() {
    weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .args(["--format", "toml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2001"));
}

#[test]
fn emit_missing_config_file_exits_one() {
    weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .args(["--config", "missing-weir.yaml"])
        .assert()
        .failure()
        .code(1);
}

// ---------------------------------------------------------------------------
// weir validate
// ---------------------------------------------------------------------------

#[test]
fn validate_valid_document_exits_zero() {
    weir()
        .args(["validate", "--document"])
        .arg(fixture("minimal-asyncapi.yaml"))
        .assert()
        .success()
        .stderr(contains("is valid"));
}

#[test]
fn validate_dangling_reference_exits_one() {
    weir()
        .args(["validate", "--document"])
        .arg(fixture("dangling-reference.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2065"))
        .stderr(contains("foo"));
}

#[test]
fn validate_json_format_outputs_valid_json() {
    let output = weir()
        .args(["validate", "--document"])
        .arg(fixture("dangling-reference.yaml"))
        .args(["--format", "json"])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let s = String::from_utf8(output).expect("stdout should be valid UTF-8");
    let v: serde_json::Value =
        serde_json::from_str(&s).expect("--format json output should be valid JSON even on error");
    assert_eq!(v["result"]["valid"], false);
    let errors = v["result"]["errors"].as_array().expect("errors should be an array");
    assert_eq!(errors.len(), 1);
}

#[test]
fn validate_missing_file_exits_one() {
    weir()
        .args(["validate", "--document", "this-file-does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn emitted_document_validates() {
    let tmp = TempDir::new().expect("temp dir");
    let out = tmp.path().join("asyncapi.yaml");

    weir()
        .args(["emit", "--source"])
        .arg(fixture("users.yaml"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    weir()
        .args(["validate", "--document"])
        .arg(&out)
        .assert()
        .success();
}
