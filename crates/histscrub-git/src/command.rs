use std::path::Path;
use std::process::{Output, Stdio};

use histscrub_core::{Result, ScrubError};
use tokio::process::Command;

/// Lines of stderr kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// `git` rooted at `dir`, with prompts disabled and a stable locale
pub fn git(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Run git and return its raw output, whatever the exit status
pub async fn output(dir: &Path, args: &[&str]) -> Result<Output> {
    git(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| ScrubError::Git(format!("Failed to run git {}: {}", args.join(" "), e)))
}

/// Run git and return stdout, failing on a non-zero exit status
pub async fn run(dir: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let output = output(dir, args).await?;

    if !output.status.success() {
        return Err(ScrubError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr_tail(&output.stderr)
        )));
    }

    Ok(output.stdout)
}

/// Last lines of a child's stderr, for diagnostics
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");

    if tail.is_empty() {
        "(no output)".to_string()
    } else {
        tail
    }
}
