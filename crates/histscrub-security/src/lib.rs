//! Credential extraction, validation and replacement planning
//!
//! Everything in this crate is pure: it works on content already read from
//! the repository and never touches the filesystem or spawns processes.

pub mod extractor;
pub mod planner;
pub mod validator;

pub use extractor::{KeyMatcher, extract_credential};
pub use planner::ReplacementPlanner;
pub use validator::{CredentialImplausible, CredentialValidator, DEFAULT_SEPARATORS};
