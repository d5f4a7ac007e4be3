//! Disposable mirror clones that destructive stages run against

use std::path::{Path, PathBuf};

use histscrub_core::{Result, ScrubError};
use tracing::{debug, info, warn};

use crate::command::{output, stderr_tail};
use crate::repo::Repository;

/// Fail fast if a previous run left its snapshot behind
pub fn ensure_absent(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Err(ScrubError::StaleSnapshot(dir.to_path_buf()));
    }
    Ok(())
}

/// An isolated mirror clone (every ref: branches, tags, remote-tracking refs)
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    pub async fn create(source: &Repository, dir: &Path) -> Result<Self> {
        ensure_absent(dir)?;

        let dir = std::path::absolute(dir)?;
        let parent = dir
            .parent()
            .ok_or_else(|| {
                ScrubError::SnapshotFailed(format!("{} has no parent directory", dir.display()))
            })?
            .to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;

        let source_arg = source.path().to_string_lossy().into_owned();
        let dest_arg = dir.to_string_lossy().into_owned();

        debug!("Cloning {} into {}", source_arg, dest_arg);
        let out = output(
            &parent,
            &[
                "clone",
                "--quiet",
                "--mirror",
                "--no-local",
                "--",
                &source_arg,
                &dest_arg,
            ],
        )
        .await?;

        if !out.status.success() {
            // A half-written clone must not be mistaken for a stale snapshot next time
            if dir.exists()
                && let Err(e) = tokio::fs::remove_dir_all(&dir).await
            {
                warn!(
                    "Could not remove partial clone {}: {}; delete it before the next run",
                    dir.display(),
                    e
                );
            }
            return Err(ScrubError::SnapshotFailed(format!(
                "git clone --mirror of {} failed: {}",
                source_arg,
                stderr_tail(&out.stderr)
            )));
        }

        info!("Created snapshot at {}", dir.display());
        Ok(Self { path: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository(&self) -> Repository {
        Repository::at(self.path.clone())
    }

    /// Remove the snapshot directory
    pub async fn discard(self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.path).await?;
        debug!("Discarded snapshot {}", self.path.display());
        Ok(())
    }

    /// Keep the snapshot on disk and return its location
    pub fn keep(self) -> PathBuf {
        self.path
    }
}
