//! Error types for the sync client.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the sync client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Persistence failure.
    #[error(transparent)]
    Storage(#[from] jotsync_storage::StorageError),

    /// Wire protocol failure.
    #[error(transparent)]
    Protocol(#[from] jotsync_protocol::ProtocolError),

    /// Structural diff failure.
    #[error(transparent)]
    Diff(#[from] jotsync_jsondiff::JsonDiffError),

    /// The entity value has an unusable shape.
    #[error("entity {id:?} is not a JSON object")]
    NotAnObject {
        /// Entity id.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ClientError::NotAnObject { id: "note-1".into() };
        assert!(err.to_string().contains("note-1"));
    }
}
