//! End-to-end tests for the `tryton-tasks completions` command.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_completions_help() {
    TestFixture::new()
        .command()
        .args(["completions", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generate shell completion scripts"))
        .stdout(predicate::str::contains("bash"))
        .stdout(predicate::str::contains("powershell"));
}

#[test]
fn test_completions_bash() {
    TestFixture::new()
        .command()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_tryton__tasks()"))
        .stdout(predicate::str::contains("module-diff"))
        .stdout(predicate::str::contains("module-version"))
        .stdout(predicate::str::contains("set-revision"));
}

#[test]
fn test_completions_zsh() {
    TestFixture::new()
        .command()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#compdef tryton-tasks"));
}

#[test]
fn test_completions_to_file() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["completions", "fish", "--output", "tryton-tasks.fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    fixture
        .child("tryton-tasks.fish")
        .assert(predicate::str::contains("complete -c tryton-tasks"));
}

#[test]
fn test_completions_unknown_shell() {
    TestFixture::new()
        .command()
        .args(["completions", "tcsh"])
        .assert()
        .code(2);
}
