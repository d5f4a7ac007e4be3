//! Plausibility checks run before a credential is allowed into a rewrite plan

use std::fmt;

pub use histscrub_core::DEFAULT_SEPARATORS;
use histscrub_core::{ExtractedCredential, Result, ScrubError};

/// Warning-level finding: the value has characters outside the expected set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialImplausible {
    pub label: String,
    pub unexpected_chars: usize,
    pub allowed: String,
}

impl fmt::Display for CredentialImplausible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "credential from {} has {} character(s) outside [A-Za-z0-9{}]; redacting anyway",
            self.label, self.unexpected_chars, self.allowed
        )
    }
}

pub struct CredentialValidator {
    separators: String,
}

impl CredentialValidator {
    pub fn new(separators: impl Into<String>) -> Self {
        Self {
            separators: separators.into(),
        }
    }

    /// Check emptiness, then the source's minimum length, then character class.
    ///
    /// The first two are fatal. The character class check only ever produces a
    /// warning: skipping a real secret with unusual characters is worse than
    /// redacting it.
    pub fn validate(&self, credential: &ExtractedCredential) -> Result<Option<CredentialImplausible>> {
        let source = credential.source();

        if credential.is_empty() {
            return Err(ScrubError::CredentialInvalid {
                label: source.label.clone(),
                reason: format!(
                    "value assigned to {} in {} is empty",
                    source.key_description(),
                    source.object_expr()
                ),
            });
        }

        let length = credential.len();
        if length < source.min_length {
            return Err(ScrubError::CredentialInvalid {
                label: source.label.clone(),
                reason: format!(
                    "value in {} is {} characters, shorter than the configured minimum of {}",
                    source.object_expr(),
                    length,
                    source.min_length
                ),
            });
        }

        let unexpected_chars = credential
            .expose()
            .chars()
            .filter(|c| !c.is_ascii_alphanumeric() && !self.separators.contains(*c))
            .count();

        if unexpected_chars > 0 {
            return Ok(Some(CredentialImplausible {
                label: source.label.clone(),
                unexpected_chars,
                allowed: self.separators.clone(),
            }));
        }

        Ok(None)
    }
}

impl Default for CredentialValidator {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATORS)
    }
}
