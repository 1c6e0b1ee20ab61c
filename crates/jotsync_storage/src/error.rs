//! Error types for storage backends.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in a key/value store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// An I/O error from the underlying filesystem.
    #[error("io error on key {key:?}: {source}")]
    Io {
        /// The key involved.
        key: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored value was not valid UTF-8.
    #[error("corrupt value for key {key:?}")]
    Corrupt {
        /// The key involved.
        key: String,
    },

    /// A key contained characters the backend cannot represent.
    #[error("invalid key {key:?}")]
    InvalidKey {
        /// The key involved.
        key: String,
    },
}

impl StorageError {
    /// Wraps an I/O error with its key.
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorageError::Corrupt { key: "app/x".into() };
        assert!(err.to_string().contains("app/x"));
    }
}
