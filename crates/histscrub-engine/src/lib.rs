//! Remediation pipeline: confirmation, preflight, snapshot, extraction,
//! validation, planning, rewrite, reclaim and verification

pub mod gate;
pub mod pipeline;

pub use gate::{ConfirmationGate, ScriptedGate, is_affirmative};
pub use pipeline::{NoProgress, Pipeline, Progress};
