//! End-to-end tests for batch commands on workspaces whose working copies
//! are either all present or all missing, so no SCM binary is needed.

mod common;
use common::prelude::*;

fn report(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout is a JSON report")
}

#[test]
fn test_clone_with_everything_present_is_a_no_op() {
    TestFixture::new()
        .with_manifest(manifests::MIXED)
        .with_working_copy("tryton/trytond")
        .with_working_copy("tryton/sao")
        .command()
        .arg("clone")
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_missing_working_copies_fail_each_repository() {
    TestFixture::new()
        .with_manifest(manifests::MIXED)
        .command()
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing repository: "))
        .stderr(predicate::str::contains("status failed on 2 repositories (trytond, sao)"))
        .stderr(predicate::str::contains("aggregate exit code -2"));
}

#[test]
fn test_ignore_missing_turns_missing_into_success() {
    TestFixture::new()
        .with_manifest(manifests::MIXED)
        .command()
        .args(["pull", "--ignore-missing"])
        .assert()
        .code(0);
}

#[test]
fn test_json_report() {
    let fixture = TestFixture::new().with_manifest(manifests::MIXED);
    let assert = fixture
        .command()
        .args(["status", "--format", "json"])
        .assert()
        .code(1);

    let report = report(&assert.get_output().stdout);
    assert_eq!(report["operation"], "status");
    assert_eq!(report["aggregate_exit_code"], -2);
    assert_eq!(report["failed"], serde_json::json!(["trytond", "sao"]));
    assert_eq!(report["results"][0]["kind"], "mercurial");
    assert_eq!(report["results"][1]["kind"], "git");
}

#[test]
fn test_patch_sections_take_no_part() {
    let fixture = TestFixture::new().with_manifest(manifests::MIXED);
    let assert = fixture
        .command()
        .args(["revision", "--ignore-missing", "--format", "json"])
        .assert();

    let report = report(&assert.get_output().stdout);
    let names: Vec<&str> = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|result| result["repository"].as_str().unwrap())
        .collect();
    assert!(!names.contains(&"account_invoice_fix"));
}

#[test]
fn test_unstable_repositories_need_the_flag() {
    let fixture = TestFixture::new().with_manifest(manifests::WITH_UNSTABLE);

    let stable = fixture
        .command()
        .args(["branches", "--ignore-missing", "--format", "json"])
        .assert()
        .code(0);
    assert_eq!(report(&stable.get_output().stdout)["results"].as_array().unwrap().len(), 1);

    let all = fixture
        .command()
        .args(["branches", "--ignore-missing", "--unstable", "--format", "json"])
        .assert()
        .code(0);
    assert_eq!(report(&all.get_output().stdout)["results"].as_array().unwrap().len(), 2);
}

#[test]
fn test_hg_only_commands_skip_git_repositories() {
    let fixture = TestFixture::new().with_manifest(manifests::MIXED);
    let assert = fixture
        .command()
        .args(["update", "--ignore-missing", "--format", "json"])
        .assert()
        .code(0);

    let report = report(&assert.get_output().stdout);
    assert_eq!(report["results"].as_array().unwrap().len(), 1);
    assert_eq!(report["results"][0]["repository"], "trytond");
}

#[test]
fn test_clean_without_terminal_needs_force() {
    TestFixture::new()
        .with_manifest(manifests::MIXED)
        .command()
        .arg("clean")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));
}

#[cfg(unix)]
#[test]
fn test_clone_relinks_modules_into_the_server() {
    let fixture = TestFixture::new()
        .with_manifest(manifests::MIXED)
        .with_working_copy("tryton/trytond/trytond/modules/ir")
        .with_working_copy("tryton/sao")
        .with_working_copy("tryton/modules/sale");
    let server = fixture.path().join("tryton/trytond/trytond/modules");
    std::os::unix::fs::symlink("../../../modules/dropped", server.join("dropped")).unwrap();

    fixture.command().arg("clone").assert().code(0);

    assert_eq!(
        std::fs::read_link(server.join("sale")).unwrap(),
        std::path::Path::new("../../../modules/sale")
    );
    assert!(std::fs::symlink_metadata(server.join("dropped")).is_err());
    assert!(server.join("ir").is_dir());
    assert_eq!(
        std::fs::read_link(fixture.path().join("sao")).unwrap(),
        std::path::Path::new("tryton/sao")
    );
    assert!(std::fs::symlink_metadata(fixture.path().join("proteus")).is_err());
}

#[test]
fn test_module_version_reads_tryton_cfg() {
    let fixture = TestFixture::new()
        .with_manifest(manifests::MIXED)
        .with_file("tryton/trytond/tryton.cfg", "[tryton]\nversion=7.0.4\ndepends:\n    ir\n")
        .with_working_copy("tryton/sao");
    let assert = fixture
        .command()
        .args(["module-version", "--format", "json"])
        .assert()
        .code(0);

    let report = report(&assert.get_output().stdout);
    assert_eq!(report["operation"], "module-version");
    assert_eq!(report["results"][0]["value"], "7.0.4");
    assert!(report["results"][1].get("value").is_none());
    assert!(report["results"][1]["stderr"][0]
        .as_str()
        .unwrap()
        .contains("Missing tryton.cfg file"));
}
