#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use histscrub_config::{Config, SourceDefinition};

pub fn run_git(repo_dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .env("GIT_AUTHOR_NAME", "test-user")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test-user")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn make_git_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    run_git(dir, &["init", "--quiet"]);
    run_git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
}

pub fn commit_file(repo_dir: &Path, path: &str, content: &str, message: &str) -> String {
    let file = repo_dir.join(path);
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&file, content).unwrap();
    run_git(repo_dir, &["add", path]);
    run_git(repo_dir, &["commit", "--quiet", "-m", message]);
    run_git(repo_dir, &["rev-parse", "HEAD"])
}

pub fn source(label: &str, commit: &str, path: &str, key: &str, min_length: usize) -> SourceDefinition {
    SourceDefinition {
        label: Some(label.to_string()),
        commit: commit.to_string(),
        path: path.to_string(),
        key: Some(key.to_string()),
        min_length,
    }
}

/// Config whose snapshot lands at `snapshot_dir`
pub fn config(snapshot_dir: &Path, sources: Vec<SourceDefinition>) -> Config {
    let mut config = Config::default();
    config.snapshot.dir = Some(snapshot_dir.to_path_buf());
    config.sources = sources;
    config
}
