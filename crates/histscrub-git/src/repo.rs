//! Read-only queries against a repository's object database

use std::path::{Path, PathBuf};

use histscrub_core::{CommitRef, Result, ScrubError, SecretSource};
use zeroize::Zeroizing;

use crate::command::{output, run};

#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Open the repository at `path`, failing if it is not a git repository
    pub async fn open(path: &Path) -> Result<Self> {
        let path = tokio::fs::canonicalize(path).await.map_err(|e| {
            ScrubError::Config(format!("Cannot open repository {}: {}", path.display(), e))
        })?;

        let probe = output(&path, &["rev-parse", "--git-dir"]).await?;
        if !probe.status.success() {
            return Err(ScrubError::Config(format!(
                "{} is not a git repository",
                path.display()
            )));
        }

        Ok(Self { path })
    }

    /// Wrap a path already known to hold a repository
    pub(crate) fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full commit id for `commit`, or `None` if it does not name a commit here
    pub async fn resolve_commit(&self, commit: &CommitRef) -> Result<Option<String>> {
        let expr = commit.commit_expr();
        let out = output(&self.path, &["rev-parse", "--verify", "--quiet", &expr]).await?;

        if !out.status.success() {
            return Ok(None);
        }

        let oid = String::from_utf8_lossy(&out.stdout).trim().to_string();
        Ok(if oid.is_empty() { None } else { Some(oid) })
    }

    pub async fn is_shallow(&self) -> Result<bool> {
        let stdout = run(&self.path, &["rev-parse", "--is-shallow-repository"]).await?;
        Ok(String::from_utf8_lossy(&stdout).trim() == "true")
    }

    /// Resolve `commit`, mapping absence to `CommitNotFound` with a shallow-clone diagnosis
    pub async fn require_commit(&self, commit: &CommitRef) -> Result<String> {
        match self.resolve_commit(commit).await? {
            Some(oid) => Ok(oid),
            None => Err(ScrubError::CommitNotFound {
                commit: commit.to_string(),
                shallow: self.is_shallow().await?,
            }),
        }
    }

    /// Whether any ref contains commit `oid`.
    ///
    /// A mirror clone only copies what refs reach, so a commit known only to
    /// the reflog would be missing from the snapshot.
    pub async fn is_reachable(&self, oid: &str) -> Result<bool> {
        let stdout = run(
            &self.path,
            &["for-each-ref", "--contains", oid, "--format=%(refname)"],
        )
        .await?;
        Ok(!String::from_utf8_lossy(&stdout).trim().is_empty())
    }

    /// Whether `path` exists in the tree of commit `oid`
    pub async fn path_exists_at(&self, oid: &str, path: &str) -> Result<bool> {
        let object = format!("{}:{}", oid, path);
        let out = output(&self.path, &["cat-file", "-e", &object]).await?;
        Ok(out.status.success())
    }

    /// Content of `path` as it existed at commit `oid`
    pub async fn read_blob_at(&self, oid: &str, path: &str) -> Result<Zeroizing<String>> {
        let object = format!("{}:{}", oid, path);
        let bytes = Zeroizing::new(run(&self.path, &["cat-file", "blob", &object]).await?);
        Ok(Zeroizing::new(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Read the file a secret source points at, distinguishing a missing
    /// commit from a missing file
    pub async fn read_source(&self, source: &SecretSource) -> Result<Zeroizing<String>> {
        let oid = self.require_commit(&source.commit).await?;

        if !self.path_exists_at(&oid, &source.path).await? {
            return Err(ScrubError::FileNotFoundAtCommit {
                commit: source.commit.to_string(),
                path: source.path.clone(),
            });
        }

        self.read_blob_at(&oid, &source.path).await
    }

    /// URL of a configured remote, if any
    pub async fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let out = output(&self.path, &["remote", "get-url", name]).await?;
        if !out.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&out.stdout).trim().to_string();
        Ok(if url.is_empty() { None } else { Some(url) })
    }

    /// Every ref (branches, tags, remote-tracking refs)
    pub async fn refs(&self) -> Result<Vec<String>> {
        let stdout = run(&self.path, &["for-each-ref", "--format=%(refname)"]).await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}
