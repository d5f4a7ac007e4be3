//! Core domain models for histscrub
//!
//! This crate contains:
//! - Secret locators (CommitRef, SecretSource)
//! - In-memory credential and rewrite plan types
//! - The error taxonomy and the per-run result record

pub mod credential;
pub mod error;
pub mod plan;
pub mod run;
pub mod source;

pub use credential::{DEFAULT_SEPARATORS, ExtractedCredential};
pub use error::{Result, ScrubError};
pub use plan::{DEFAULT_REDACTION_MARKER, ReplacementRule, RewritePlan, check_marker};
pub use run::{
    Failure, FailureKind, ResidualHit, RunBuilder, RunResult, Stage, VerificationReport, Warning,
};
pub use source::{CommitRef, SecretSource};
