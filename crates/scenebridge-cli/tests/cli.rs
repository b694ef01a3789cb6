//! CLI argument handling; everything that does not need a native library.

use assert_cmd::Command;
use predicates::prelude::*;

fn scenebridge() -> Command {
    Command::cargo_bin("scenebridge").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    scenebridge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("formats"))
        .stdout(predicate::str::contains("extensions"));
}

#[test]
fn test_convert_requires_paths() {
    scenebridge().arg("convert").assert().failure();
}

#[test]
fn test_explicit_library_path_failure_is_reported() {
    scenebridge()
        .args(["info", "--library", "/nonexistent/libassimp-test.so"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading native library"));
}

#[test]
fn test_unknown_subcommand_fails() {
    scenebridge().arg("frobnicate").assert().failure();
}
