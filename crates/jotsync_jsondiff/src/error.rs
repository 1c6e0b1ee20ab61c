//! Error types for structural diff operations.

use thiserror::Error;

/// Result type for structural diff operations.
pub type JsonDiffResult<T> = Result<T, JsonDiffError>;

/// Errors that can occur while applying or transforming structural diffs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonDiffError {
    /// A diff entry did not match the shape of the value it targets.
    #[error("type mismatch at {path:?}: expected {expected}")]
    TypeMismatch {
        /// Key or index the entry targets.
        path: String,
        /// The JSON type the entry requires.
        expected: &'static str,
    },

    /// A diff entry targets a key or index absent from the value.
    #[error("missing target {path:?}")]
    MissingTarget {
        /// Key or index the entry targets.
        path: String,
    },

    /// A list operation landed outside the array bounds.
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// Effective index after delete shifting.
        index: usize,
        /// Array length at apply time.
        len: usize,
    },

    /// A serialized diff entry could not be decoded.
    #[error("malformed diff entry: {0}")]
    Malformed(String),

    /// A text delta failed to decode or apply.
    #[error(transparent)]
    Text(#[from] jotsync_textdiff::TextDiffError),
}

impl JsonDiffError {
    /// Creates a type-mismatch error.
    pub fn type_mismatch(path: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected,
        }
    }

    /// Creates a missing-target error.
    pub fn missing_target(path: impl Into<String>) -> Self {
        Self::MissingTarget { path: path.into() }
    }

    /// Creates a malformed-entry error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = JsonDiffError::type_mismatch("content", "string");
        assert!(err.to_string().contains("content"));
        assert!(err.to_string().contains("string"));

        let err = JsonDiffError::IndexOutOfBounds { index: 9, len: 3 };
        assert!(err.to_string().contains('9'));
    }
}
