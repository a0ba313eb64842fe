//! Smoke tests for the `runbooks` binary

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("runbooks")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("print-config"));
}

#[test]
fn test_print_config_outputs_example() {
    Command::cargo_bin("runbooks")
        .unwrap()
        .arg("print-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[exec]"))
        .stdout(predicate::str::contains("timeout_secs"));
}

#[test]
fn test_unknown_command_fails() {
    Command::cargo_bin("runbooks")
        .unwrap()
        .arg("bogus")
        .assert()
        .failure();
}
