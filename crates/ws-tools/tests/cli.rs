//! End-to-end checks of the front-ends' exit contract
//!
//! Only paths that need no elevated privilege are exercised here; the
//! privileged mutations are covered by the engine's lifecycle tests.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn site() -> (TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    for dir in ["pool/.removed", "db/.removed"] {
        fs::create_dir_all(root.path().join(dir)).unwrap();
    }
    let meta = fs::metadata(root.path()).unwrap();
    let p = |rel: &str| root.path().join(rel).display().to_string();

    let config = root.path().join("ws.toml");
    fs::write(
        &config,
        format!(
            r#"
            config_version = 1
            default = "scratch"
            duration = 30
            maxextensions = 3
            dbuid = {uid}
            dbgid = {gid}

            [[workspaces]]
            name = "scratch"
            spaces = ["{pool}"]
            database = "{db}"
            deleted = ".removed"
            "#,
            uid = meta.uid(),
            gid = meta.gid(),
            pool = p("pool"),
            db = p("db"),
        ),
    )
    .unwrap();
    (root, config)
}

fn run(bin: &str, config: &Path, args: &[&str]) -> Output {
    Command::new(bin)
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("WS_CONFIG")
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn releasing_an_unknown_workspace_fails() {
    let (_root, config) = site();
    let out = run(env!("CARGO_BIN_EXE_ws_release"), &config, &["nothing-here"]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(stderr(&out).contains("Not found"), "{}", stderr(&out));
}

#[test]
fn empty_trash_lists_nothing() {
    let (_root, config) = site();
    let out = run(env!("CARGO_BIN_EXE_ws_restore"), &config, &["-l", "-b"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(out.stdout.is_empty());
}

#[test]
fn unknown_filesystem_is_reported() {
    let (_root, config) = site();
    let out = run(env!("CARGO_BIN_EXE_ws_release"), &config, &["-F", "nope", "data"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("nope"), "{}", stderr(&out));
}

#[test]
fn missing_policy_file_is_fatal() {
    let (root, _config) = site();
    let out = run(
        env!("CARGO_BIN_EXE_ws_allocate"),
        &root.path().join("absent.toml"),
        &["data"],
    );
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(stderr(&out).contains("Failed to load config"), "{}", stderr(&out));
}

#[test]
fn illegal_names_never_reach_the_engine() {
    let (_root, config) = site();
    let out = run(env!("CARGO_BIN_EXE_ws_allocate"), &config, &[".hidden"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains(".hidden"), "{}", stderr(&out));
}
