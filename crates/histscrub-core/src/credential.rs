//! In-memory secret values
//!
//! Values are held in `Zeroizing` buffers so they are wiped when dropped, on
//! success and error paths alike. `Debug` never prints the value.

use std::fmt;

use zeroize::Zeroizing;

use crate::source::SecretSource;

/// Separator characters accepted next to ASCII alphanumerics in a credential
pub const DEFAULT_SEPARATORS: &str = "-_./+=";

/// A secret value found at a `SecretSource`
pub struct ExtractedCredential {
    value: Zeroizing<String>,
    source: SecretSource,
}

impl ExtractedCredential {
    pub fn new(value: Zeroizing<String>, source: SecretSource) -> Self {
        Self { value, source }
    }

    /// Borrow the plaintext value
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn source(&self) -> &SecretSource {
        &self.source
    }

    pub fn into_parts(self) -> (Zeroizing<String>, SecretSource) {
        (self.value, self.source)
    }
}

impl fmt::Debug for ExtractedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractedCredential")
            .field("value", &format_args!("[REDACTED; {} chars]", self.len()))
            .field("source", &self.source)
            .finish()
    }
}
