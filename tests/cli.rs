//! CLI integration tests for subcommands that need no subprocess toolchain
//! to produce deterministic output.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn list_runners_prints_every_registered_runner() {
    let mut cmd = Command::cargo_bin("patchcheck").unwrap();
    cmd.arg("list-runners");
    cmd.assert().success().stdout(contains("pytest")).stdout(contains("cargo test"));
}

#[test]
fn detect_reports_no_runners_for_empty_repo() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("patchcheck").unwrap();
    cmd.arg("detect").arg(dir.path());
    cmd.assert().failure().stdout(contains("No runners detected"));
}

#[test]
fn detect_finds_pytest_project() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pytest.ini"), "[pytest]\n").unwrap();
    std::fs::write(dir.path().join("conftest.py"), "").unwrap();

    let mut cmd = Command::cargo_bin("patchcheck").unwrap();
    cmd.arg("detect").arg(dir.path());
    cmd.assert().success().stdout(contains("pytest"));
}

#[test]
fn preflight_blocks_on_missing_repo() {
    let mut cmd = Command::cargo_bin("patchcheck").unwrap();
    cmd.arg("preflight").arg("/nonexistent/repo/path/xyz");
    cmd.assert().failure().stdout(contains("REPO_NOT_FOUND"));
}
