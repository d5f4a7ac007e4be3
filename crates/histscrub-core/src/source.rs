//! Secret locators supplied by the operator

use serde::{Deserialize, Serialize};
use std::fmt;

/// A historical point in the repository graph (hash or symbolic ref)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Revision expression that only resolves if the ref names a commit
    pub fn commit_expr(&self) -> String {
        format!("{}^{{commit}}", self.0)
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a secret lives: a file at a commit, and the key it is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSource {
    pub label: String,
    pub commit: CommitRef,
    /// Path relative to the repository root
    pub path: String,
    /// Exact key name; `None` accepts any identifier
    pub key: Option<String>,
    /// Shortest value accepted as a real credential of this kind
    pub min_length: usize,
}

impl SecretSource {
    /// Human-readable key matcher for diagnostics
    pub fn key_description(&self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None => "<any identifier>".to_string(),
        }
    }

    /// `commit:path` object expression for git plumbing
    pub fn object_expr(&self) -> String {
        format!("{}:{}", self.commit, self.path)
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.label, self.commit, self.path)
    }
}
