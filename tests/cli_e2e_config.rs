//! End-to-end tests for the `tryton-tasks config` command.

mod common;
use common::prelude::*;

#[test]
fn test_set_branch_rewrites_repository_sections() {
    let fixture = TestFixture::new().with_manifest(manifests::MIXED);

    fixture
        .command()
        .args(["config", "set-branch", "7.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set branch 7.2 on 2 repositories"));

    let manifest = ini::Ini::load_from_file(fixture.manifest_path()).unwrap();
    assert_eq!(manifest.get_from(Some("trytond"), "branch"), Some("7.2"));
    assert_eq!(manifest.get_from(Some("sao"), "branch"), Some("7.2"));
    assert_eq!(manifest.get_from(Some("account_invoice_fix"), "branch"), None);
    assert_eq!(manifest.get_from(Some("trytond"), "url"), Some("https://hg.tryton.org/trytond"));
}

#[test]
fn test_set_branch_edits_every_manifest_file() {
    let fixture = TestFixture::new()
        .with_manifest(manifests::MIXED)
        .with_file("local.cfg", "[proteus]\nrepo = hg\nurl = https://hg.tryton.org/proteus\npath = ./tryton\n");

    fixture
        .command()
        .args(["config", "set-branch", "default"])
        .assert()
        .success();

    fixture
        .child("local.cfg")
        .assert(predicate::str::contains("branch=default").or(predicate::str::contains("branch = default")));
}

#[test]
fn test_set_branch_requires_a_manifest() {
    TestFixture::new()
        .command()
        .args(["config", "set-branch", "7.2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Repository manifest not found"));
}

#[test]
fn test_set_branch_requires_a_branch() {
    TestFixture::new()
        .with_manifest(manifests::MIXED)
        .command()
        .args(["config", "set-branch"])
        .assert()
        .code(2);
}

#[test]
fn test_set_revision_leaves_missing_repositories_unpinned() {
    let fixture = TestFixture::new().with_manifest(manifests::MIXED);

    fixture
        .command()
        .args(["config", "set-revision", "--ignore-missing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("revision failed on 1 repositories (sao)"));

    let manifest = ini::Ini::load_from_file(fixture.manifest_path()).unwrap();
    assert_eq!(manifest.get_from(Some("trytond"), "revision"), None);
    assert_eq!(manifest.get_from(Some("sao"), "revision"), None);
}
