use histscrub_core::{ExtractedCredential, ReplacementRule, Result, RewritePlan, check_marker};
use zeroize::Zeroizing;

/// Builds the literal -> redaction marker mapping for one run
pub struct ReplacementPlanner {
    marker: String,
}

impl ReplacementPlanner {
    pub fn new(marker: impl Into<String>) -> Result<Self> {
        let marker = marker.into();
        check_marker(&marker)?;
        Ok(Self { marker })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Consume validated credentials and produce the rewrite plan.
    ///
    /// The same secret reused in several files yields a single rule that
    /// remembers every source label.
    pub fn plan(&self, credentials: Vec<ExtractedCredential>) -> Result<RewritePlan> {
        let mut merged: Vec<(Zeroizing<String>, Vec<String>)> = Vec::new();

        for credential in credentials {
            let (value, source) = credential.into_parts();
            match merged.iter_mut().find(|(literal, _)| **literal == *value) {
                Some((_, labels)) => {
                    tracing::debug!("Source {} reuses an already planned secret", source.label);
                    labels.push(source.label);
                }
                None => merged.push((value, vec![source.label])),
            }
        }

        let rules = merged
            .into_iter()
            .map(|(literal, labels)| ReplacementRule::new(literal, self.marker.clone(), labels))
            .collect::<Result<Vec<_>>>()?;

        RewritePlan::new(rules)
    }
}
