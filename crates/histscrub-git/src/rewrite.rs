//! History rewrite engine invocation
//!
//! The rewrite plan reaches the engine through an expressions file that only
//! exists for the duration of one invocation: created owner-only, overwritten
//! with zeros and unlinked as soon as the engine exits.

use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use histscrub_core::{Result, RewritePlan, ScrubError};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::command::stderr_tail;

/// External engine that rewrites every ref of a repository in place
#[async_trait]
pub trait RewriteEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Fail with `EngineUnavailable` if the engine cannot be run
    fn ensure_available(&self) -> Result<()>;

    /// Apply `plan` to every branch and tag of the repository at `repo`.
    ///
    /// Destructive and irreversible. Once started this cannot be cancelled
    /// safely: dropping the future does not stop the engine, and an
    /// interrupted rewrite leaves the repository in an undefined state.
    async fn rewrite(&self, repo: &Path, plan: &RewritePlan) -> Result<()>;
}

/// `git filter-repo --replace-text`
pub struct FilterRepo {
    program: String,
    replace_messages: bool,
}

impl FilterRepo {
    pub fn new(program: impl Into<String>, replace_messages: bool) -> Self {
        Self {
            program: program.into(),
            replace_messages,
        }
    }

    fn command(&self, repo: &Path, expressions: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(repo)
            .arg("--replace-text")
            .arg(expressions);
        if self.replace_messages {
            cmd.arg("--replace-message").arg(expressions);
        }
        // No --refs: the engine defaults to every ref in the repository
        cmd.arg("--force")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(false);
        cmd
    }
}

impl Default for FilterRepo {
    fn default() -> Self {
        Self::new("git-filter-repo", true)
    }
}

#[async_trait]
impl RewriteEngine for FilterRepo {
    fn name(&self) -> &str {
        &self.program
    }

    fn ensure_available(&self) -> Result<()> {
        which::which(&self.program).map(|_| ()).map_err(|e| {
            ScrubError::EngineUnavailable(format!(
                "{} not found ({}); install git-filter-repo and make sure it is on PATH",
                self.program, e
            ))
        })
    }

    async fn rewrite(&self, repo: &Path, plan: &RewritePlan) -> Result<()> {
        let expressions = ExpressionsFile::write(plan)?;

        info!(
            "Running {} with {} rule(s) across all refs of {}",
            self.program,
            plan.len(),
            repo.display()
        );
        let result = self.command(repo, expressions.path()).output().await;
        drop(expressions);

        let output = result.map_err(|e| {
            ScrubError::RewriteEngineFailure(format!("failed to start {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let tail = scrub_literals(&stderr_tail(&output.stderr), plan);
            return Err(ScrubError::RewriteEngineFailure(format!(
                "{} exited with {}: {}",
                self.program, output.status, tail
            )));
        }

        Ok(())
    }
}

/// Replace any plan literal echoed by the engine before it reaches an error message
fn scrub_literals(text: &str, plan: &RewritePlan) -> String {
    let mut scrubbed = text.to_string();
    for rule in plan.rules() {
        if scrubbed.contains(rule.literal()) {
            scrubbed = scrubbed.replace(rule.literal(), rule.replacement());
        }
    }
    scrubbed
}

/// Rewrite plan rendered as `literal:<secret>==><marker>` lines in a
/// single-use temp file
pub struct ExpressionsFile {
    file: NamedTempFile,
    len: usize,
}

impl ExpressionsFile {
    pub fn write(plan: &RewritePlan) -> Result<Self> {
        let contents = render_expressions(plan);

        // tempfile creates the file with owner-only permissions
        let mut file = tempfile::Builder::new()
            .prefix("histscrub-")
            .suffix(".expressions")
            .tempfile()?;
        file.write_all(&contents)?;
        file.as_file().sync_all()?;

        Ok(Self {
            file,
            len: contents.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn wipe(&mut self) -> std::io::Result<()> {
        let zeros = vec![0u8; self.len];
        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&zeros)?;
        file.sync_all()
    }
}

impl Drop for ExpressionsFile {
    fn drop(&mut self) {
        if let Err(e) = self.wipe() {
            warn!("Failed to overwrite expressions file before removal: {}", e);
        }
        // NamedTempFile unlinks the path when it drops right after this
    }
}

fn render_expressions(plan: &RewritePlan) -> Zeroizing<Vec<u8>> {
    let mut contents = Zeroizing::new(Vec::new());
    for rule in plan.rules() {
        contents.extend_from_slice(b"literal:");
        contents.extend_from_slice(rule.literal().as_bytes());
        contents.extend_from_slice(b"==>");
        contents.extend_from_slice(rule.replacement().as_bytes());
        contents.push(b'\n');
    }
    contents
}
