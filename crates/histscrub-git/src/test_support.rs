use std::path::Path;
use std::process::Command as StdCommand;

pub fn run_git(repo_dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
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

pub fn make_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init", "--quiet"]);
    run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
    dir
}

/// Write `content` to `path`, commit it, and return the new commit id
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
