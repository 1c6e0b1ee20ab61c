//! Error types for the text diff kernel.

use thiserror::Error;

/// Result type for text diff operations.
pub type TextDiffResult<T> = Result<T, TextDiffError>;

/// Errors that can occur in diff, match and patch operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextDiffError {
    /// A delta string failed to parse or did not cover its source text.
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// A serialized patch failed to parse.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// A bitap pattern exceeded the bit width of the match engine.
    #[error("pattern too long for bitap: {len} units (limit {max})")]
    PatternTooLong {
        /// Pattern length in UTF-16 code units.
        len: usize,
        /// Maximum supported pattern length.
        max: usize,
    },

    /// A percent-encoded token contained a malformed escape sequence.
    #[error("malformed percent escape in {0:?}")]
    BadEscape(String),
}

impl TextDiffError {
    /// Creates an invalid-delta error.
    pub fn invalid_delta(message: impl Into<String>) -> Self {
        Self::InvalidDelta(message.into())
    }

    /// Creates an invalid-patch error.
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TextDiffError::PatternTooLong { len: 40, max: 32 };
        assert!(err.to_string().contains("40"));
        assert!(err.to_string().contains("32"));

        let err = TextDiffError::invalid_delta("truncated token");
        assert_eq!(err.to_string(), "invalid delta: truncated token");
    }
}
