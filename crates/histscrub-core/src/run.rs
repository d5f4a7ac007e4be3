//! Pipeline stages and the immutable per-run result record

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ScrubError;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Confirmation,
    Preflight,
    Snapshot,
    Extraction,
    Validation,
    Planning,
    Rewrite,
    Reclaim,
    Verification,
    Complete,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Confirmation => "confirmation",
            Stage::Preflight => "preflight",
            Stage::Snapshot => "snapshot",
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
            Stage::Planning => "planning",
            Stage::Rewrite => "rewrite",
            Stage::Reclaim => "reclaim",
            Stage::Verification => "verification",
            Stage::Complete => "complete",
        }
    }

    /// Whether the snapshot history may already have been rewritten
    pub fn is_destructive(self) -> bool {
        self >= Stage::Rewrite
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializable failure category with a stable process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfirmationDeclined,
    CommitNotFound,
    FileNotFoundAtCommit,
    PatternNotMatched,
    CredentialInvalid,
    DuplicateOrEmptyRule,
    RewriteEngineFailure,
    ResidualSecretDetected,
    SnapshotFailed,
    EngineUnavailable,
    Config,
    Internal,
}

impl FailureKind {
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::Internal | FailureKind::Config => 1,
            FailureKind::ConfirmationDeclined => 2,
            FailureKind::CommitNotFound => 3,
            FailureKind::FileNotFoundAtCommit => 4,
            FailureKind::PatternNotMatched => 5,
            FailureKind::CredentialInvalid => 6,
            FailureKind::DuplicateOrEmptyRule => 7,
            FailureKind::RewriteEngineFailure => 8,
            FailureKind::ResidualSecretDetected => 9,
            FailureKind::SnapshotFailed => 10,
            FailureKind::EngineUnavailable => 11,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub message: String,
}

impl Failure {
    pub fn from_error(stage: Stage, err: &ScrubError) -> Self {
        Self {
            kind: err.kind(),
            stage,
            message: err.to_string(),
        }
    }
}

/// Non-fatal finding (implausible credential, reclaim failure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub stage: Stage,
    pub message: String,
}

/// An object that still contains a secret after the rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualHit {
    pub object_id: String,
    pub object_type: String,
    /// Index of the matching rule in plan order
    pub rule_index: usize,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub objects_scanned: usize,
    pub residual: Vec<ResidualHit>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.residual.is_empty()
    }

    /// Convert residual hits into the fatal verification error
    pub fn into_result(self) -> crate::error::Result<Self> {
        if self.passed() {
            return Ok(self);
        }

        let mut labels: Vec<&str> = self
            .residual
            .iter()
            .flat_map(|hit| hit.sources.iter().map(String::as_str))
            .collect();
        labels.sort_unstable();
        labels.dedup();

        Err(ScrubError::ResidualSecretDetected {
            hits: self.residual.len(),
            labels: labels.join(", "),
        })
    }
}

/// Outcome of one pipeline run; the only artifact retained after the process ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    #[serde(with = "time::serde::timestamp")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub finished_at: OffsetDateTime,
    pub repository: PathBuf,
    pub snapshot: Option<PathBuf>,
    pub stage_reached: Stage,
    pub rules_applied: usize,
    pub verification: Option<VerificationReport>,
    pub warnings: Vec<Warning>,
    pub failure: Option<Failure>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn exit_code(&self) -> i32 {
        self.failure.as_ref().map_or(0, |f| f.kind.exit_code())
    }
}

/// Accumulates run state while the pipeline executes
#[derive(Debug)]
pub struct RunBuilder {
    run_id: String,
    started_at: OffsetDateTime,
    repository: PathBuf,
    snapshot: Option<PathBuf>,
    stage: Stage,
    rules_applied: usize,
    verification: Option<VerificationReport>,
    warnings: Vec<Warning>,
}

impl RunBuilder {
    pub fn new(repository: PathBuf) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: OffsetDateTime::now_utc(),
            repository,
            snapshot: None,
            stage: Stage::Confirmation,
            rules_applied: 0,
            verification: None,
            warnings: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(Warning {
            stage: self.stage,
            message: message.into(),
        });
    }

    pub fn set_snapshot(&mut self, path: Option<PathBuf>) {
        self.snapshot = path;
    }

    pub fn set_rules_applied(&mut self, count: usize) {
        self.rules_applied = count;
    }

    pub fn set_verification(&mut self, report: VerificationReport) {
        self.verification = Some(report);
    }

    /// Seal the run. A failure is attributed to the stage that was executing.
    pub fn finish(self, error: Option<&ScrubError>) -> RunResult {
        let failure = error.map(|e| Failure::from_error(self.stage, e));
        let stage_reached = if failure.is_none() {
            Stage::Complete
        } else {
            self.stage
        };

        RunResult {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: OffsetDateTime::now_utc(),
            repository: self.repository,
            snapshot: self.snapshot,
            stage_reached,
            rules_applied: self.rules_applied,
            verification: self.verification,
            warnings: self.warnings,
            failure,
        }
    }
}
