use histscrub_core::{ExtractedCredential, Result, ScrubError, SecretSource};
use lazy_static::lazy_static;
use regex::Regex;
use zeroize::Zeroizing;

/// Identifier accepted when a source does not name its key
const ANY_IDENTIFIER: &str = r"[A-Za-z_][A-Za-z0-9_.\-]*";

lazy_static! {
    static ref ANY_ASSIGNMENT: Regex = Regex::new(&assignment_pattern(ANY_IDENTIFIER)).unwrap();
}

/// `KEY = "value"`, `KEY='value'`, `export KEY = "value"`, `"KEY": "value"`,
/// and keyword arguments such as `Client(KEY="value")`.
///
/// The key must not be preceded by an identifier character, so `MY_KEY`
/// never satisfies a search for `KEY`.
fn assignment_pattern(key: &str) -> String {
    format!(
        r#"(?m)(?:^|[^A-Za-z0-9_.\-])[ \t]*(?:export[ \t]+)?["']?(?:{key})["']?[ \t]*[:=][ \t]*(?:"([^"\r\n]*)"|'([^'\r\n]*)')"#
    )
}

/// Matches quoted key assignments for one secret source
pub struct KeyMatcher {
    pattern: Regex,
}

impl KeyMatcher {
    pub fn for_source(source: &SecretSource) -> Result<Self> {
        let pattern = match &source.key {
            Some(key) => {
                if key.trim().is_empty() {
                    return Err(ScrubError::Config(format!(
                        "source '{}' has an empty key name",
                        source.label
                    )));
                }
                Regex::new(&assignment_pattern(&regex::escape(key.trim()))).map_err(|e| {
                    ScrubError::Config(format!(
                        "invalid key matcher for source '{}': {}",
                        source.label, e
                    ))
                })?
            }
            None => ANY_ASSIGNMENT.clone(),
        };

        Ok(Self { pattern })
    }

    /// Inner text of the first quoted literal assigned to the key
    pub fn find<'a>(&self, content: &'a str) -> Option<&'a str> {
        let captures = self.pattern.captures(content)?;
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str().trim())
    }
}

/// Pull the credential out of `content`, the file as it existed at the source commit
pub fn extract_credential(source: &SecretSource, content: &str) -> Result<ExtractedCredential> {
    let matcher = KeyMatcher::for_source(source)?;

    let value = matcher
        .find(content)
        .ok_or_else(|| ScrubError::PatternNotMatched {
            commit: source.commit.to_string(),
            path: source.path.clone(),
            key: source.key_description(),
        })?;

    tracing::debug!(
        "Extracted {} character value for {} from {}",
        value.chars().count(),
        source.label,
        source.object_expr()
    );

    Ok(ExtractedCredential::new(
        Zeroizing::new(value.to_string()),
        source.clone(),
    ))
}
