//! Replacement rules and the rewrite plan handed to the history rewrite engine

use std::collections::HashSet;
use std::fmt;

use zeroize::Zeroizing;

use crate::error::{Result, ScrubError};

pub const DEFAULT_REDACTION_MARKER: &str = "***REMOVED***";

/// Separator of the engine's expressions format; may not appear in a rule
const RULE_SEPARATOR: &str = "==>";

/// One secret literal mapped to a fixed redaction marker
pub struct ReplacementRule {
    literal: Zeroizing<String>,
    replacement: String,
    sources: Vec<String>,
}

impl ReplacementRule {
    pub fn new(
        literal: Zeroizing<String>,
        replacement: impl Into<String>,
        sources: Vec<String>,
    ) -> Result<Self> {
        let replacement = replacement.into();
        check_marker(&replacement)?;

        let origin = describe_sources(&sources);
        if literal.is_empty() {
            return Err(ScrubError::DuplicateOrEmptyRule(format!(
                "empty match literal from {}",
                origin
            )));
        }
        if literal.contains('\n') || literal.contains('\r') {
            return Err(ScrubError::DuplicateOrEmptyRule(format!(
                "match literal from {} spans multiple lines",
                origin
            )));
        }
        if literal.contains(RULE_SEPARATOR) {
            return Err(ScrubError::DuplicateOrEmptyRule(format!(
                "match literal from {} contains the rule separator '{}'",
                origin, RULE_SEPARATOR
            )));
        }
        if replacement.contains(literal.as_str()) {
            return Err(ScrubError::DuplicateOrEmptyRule(format!(
                "match literal from {} occurs inside the redaction marker",
                origin
            )));
        }

        Ok(Self {
            literal,
            replacement,
            sources,
        })
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Labels of the sources this literal was extracted from
    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

impl fmt::Debug for ReplacementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacementRule")
            .field("literal", &format_args!("[REDACTED]"))
            .field("replacement", &self.replacement)
            .field("sources", &self.sources)
            .finish()
    }
}

/// Ordered, immutable set of replacement rules for one run
#[derive(Debug)]
pub struct RewritePlan {
    rules: Vec<ReplacementRule>,
}

impl RewritePlan {
    /// Build a plan, rejecting empty plans and duplicate match literals.
    ///
    /// Rules are ordered longest literal first so that a secret which is a
    /// substring of another is only replaced after the longer one.
    pub fn new(mut rules: Vec<ReplacementRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(ScrubError::DuplicateOrEmptyRule(
                "rewrite plan has no rules".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.literal()) {
                return Err(ScrubError::DuplicateOrEmptyRule(format!(
                    "duplicate match literal from {}",
                    describe_sources(rule.sources())
                )));
            }
        }

        rules.sort_by(|a, b| b.literal.len().cmp(&a.literal.len()));

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Plaintext literals in plan order
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.literal())
    }
}

/// Validate a redaction marker for use in the engine's expressions format
pub fn check_marker(marker: &str) -> Result<()> {
    if marker.is_empty() {
        return Err(ScrubError::DuplicateOrEmptyRule(
            "redaction marker is empty".to_string(),
        ));
    }
    if marker.contains('\n') || marker.contains('\r') || marker.contains(RULE_SEPARATOR) {
        return Err(ScrubError::DuplicateOrEmptyRule(format!(
            "redaction marker may not contain a newline or '{}'",
            RULE_SEPARATOR
        )));
    }
    Ok(())
}

fn describe_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        "<unknown source>".to_string()
    } else {
        sources.join(", ")
    }
}
