//! CLI behaviour tests
//!
//! These run the built `seed` binary and check that failures surface as a
//! non-zero exit status instead of being logged and ignored.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn seed(dir: &Path, cache: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_seed"))
        .args(args)
        .arg("--cache-dir")
        .arg(cache)
        .arg("--mirror-dir")
        .arg(dir.join("mirrors"))
        .current_dir(dir)
        .output()
        .expect("Failed to execute seed")
}

fn publish_fixture(dir: &Path, cache: &Path) {
    let project = dir.join("lib-src");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("lib.go"), "package lib").unwrap();
    fs::write(project.join("build.log"), "noise").unwrap();

    let output = seed(
        dir,
        cache,
        &["publish", "--dir", "lib-src", "--spec", "acme/lib@1.0.0"],
    );
    assert!(
        output.status.success(),
        "publish failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(cache.join("acme").join("lib@1.0.0.zip").is_file());
}

#[test]
fn test_get_invalid_spec_exits_non_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let output = seed(tmp.path(), &tmp.path().join("cache"), &["get", "repo"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid package spec"), "stderr: {stderr}");
}

#[test]
fn test_install_from_published_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tmp.path().join("cache");
    publish_fixture(tmp.path(), &cache);
    fs::write(tmp.path().join("Seedfile"), "goseed.io/acme/lib@1.0.0\n").unwrap();

    let output = seed(tmp.path(), &cache, &["install"]);
    assert!(
        output.status.success(),
        "install failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let vendored = tmp.path().join("vendor").join("acme").join("lib");
    assert!(vendored.join("lib.go").is_file());
    assert!(!vendored.join("build.log").exists());
}

#[test]
fn test_install_reports_failure_but_keeps_going() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tmp.path().join("cache");
    publish_fixture(tmp.path(), &cache);
    fs::write(
        tmp.path().join("Seedfile"),
        "goseed.io/acme/missing@1.0.0\ngoseed.io/acme/lib@1.0.0\n",
    )
    .unwrap();

    let output = seed(tmp.path(), &cache, &["install", "-d", "deps"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to install"));
    assert!(tmp.path().join("deps/acme/lib/lib.go").is_file());
    assert!(!tmp.path().join("deps/acme/missing").exists());
}

#[test]
fn test_install_toml_manifest_and_list() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tmp.path().join("cache");
    publish_fixture(tmp.path(), &cache);
    fs::write(
        tmp.path().join("Seedfile"),
        r#"
[package]
organization = "acme"
name = "app"
version = "0.1.0"
dependencies = ["goseed.io/acme/lib"]

[settings]
vendor_dir = "third_party"
"#,
    )
    .unwrap();

    let list = seed(tmp.path(), &cache, &["list"]);
    assert!(list.status.success());
    assert!(String::from_utf8_lossy(&list.stdout).contains("registry"));

    let install = seed(tmp.path(), &cache, &["install"]);
    assert!(
        install.status.success(),
        "install failed: {}",
        String::from_utf8_lossy(&install.stderr)
    );
    assert!(tmp.path().join("third_party/acme/lib/lib.go").is_file());
}

#[test]
fn test_missing_manifest_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let output = seed(tmp.path(), &tmp.path().join("cache"), &["install"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Seedfile"));
}
