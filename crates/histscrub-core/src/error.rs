use std::path::PathBuf;

use thiserror::Error;

use crate::run::FailureKind;

#[derive(Error, Debug)]
pub enum ScrubError {
    #[error("Confirmation declined: nothing was changed")]
    ConfirmationDeclined,

    #[error("Commit not found: {commit}{}", shallow_hint(.shallow))]
    CommitNotFound { commit: String, shallow: bool },

    #[error(
        "Shallow repository: {} is a shallow clone; fetch full history with `git fetch --unshallow` and retry",
        .0.display()
    )]
    ShallowRepository(PathBuf),

    #[error(
        "Commit not reachable: {commit} is not contained in any branch or tag (reflog-only or dangling); create a branch at it or pick a commit on published history"
    )]
    CommitUnreachable { commit: String },

    #[error("File not found at commit: {path} does not exist at {commit}")]
    FileNotFoundAtCommit { commit: String, path: String },

    #[error("Pattern not matched: no quoted assignment for {key} in {path} at {commit}")]
    PatternNotMatched {
        commit: String,
        path: String,
        key: String,
    },

    #[error("Invalid credential from {label}: {reason}")]
    CredentialInvalid { label: String, reason: String },

    #[error("Invalid replacement rule: {0}")]
    DuplicateOrEmptyRule(String),

    #[error("Rewrite engine failed: {0}")]
    RewriteEngineFailure(String),

    #[error(
        "Residual secrets detected: {hits} object(s) still contain secrets from {labels}; history was rewritten but the secrets remain"
    )]
    ResidualSecretDetected { hits: usize, labels: String },

    #[error("Stale snapshot directory: {} already exists (left by a previous run, remove it first)", .0.display())]
    StaleSnapshot(PathBuf),

    #[error("Snapshot failed: {0}")]
    SnapshotFailed(String),

    #[error("Rewrite engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn shallow_hint(shallow: &bool) -> &'static str {
    if *shallow {
        " (the repository is a shallow clone; fetch full history with `git fetch --unshallow` and retry)"
    } else {
        " (fetch full history with `git fetch --all --tags` if the commit lives on a remote branch)"
    }
}

impl ScrubError {
    /// Map to the serializable failure category recorded in a run result
    pub fn kind(&self) -> FailureKind {
        match self {
            ScrubError::ConfirmationDeclined => FailureKind::ConfirmationDeclined,
            ScrubError::CommitNotFound { .. }
            | ScrubError::ShallowRepository(_)
            | ScrubError::CommitUnreachable { .. } => FailureKind::CommitNotFound,
            ScrubError::FileNotFoundAtCommit { .. } => FailureKind::FileNotFoundAtCommit,
            ScrubError::PatternNotMatched { .. } => FailureKind::PatternNotMatched,
            ScrubError::CredentialInvalid { .. } => FailureKind::CredentialInvalid,
            ScrubError::DuplicateOrEmptyRule(_) => FailureKind::DuplicateOrEmptyRule,
            ScrubError::RewriteEngineFailure(_) => FailureKind::RewriteEngineFailure,
            ScrubError::ResidualSecretDetected { .. } => FailureKind::ResidualSecretDetected,
            ScrubError::StaleSnapshot(_) | ScrubError::SnapshotFailed(_) => {
                FailureKind::SnapshotFailed
            }
            ScrubError::EngineUnavailable(_) => FailureKind::EngineUnavailable,
            ScrubError::Config(_) => FailureKind::Config,
            ScrubError::Git(_) | ScrubError::Io(_) | ScrubError::Other(_) => FailureKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrubError>;
