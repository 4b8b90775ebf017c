//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_version_command() {
    Command::cargo_bin("sage")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sage version"));
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("sage")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("history"));
}
