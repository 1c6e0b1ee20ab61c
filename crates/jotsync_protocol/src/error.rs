//! Error types for the wire protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while parsing or encoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The line prefix is not a known message kind.
    #[error("unknown message prefix in {0:?}")]
    UnknownPrefix(String),

    /// A message payload failed JSON parsing.
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A message payload parsed but was structurally wrong.
    #[error("malformed {kind} message: {detail}")]
    Malformed {
        /// Message kind (wire prefix).
        kind: &'static str,
        /// What was wrong.
        detail: String,
    },

    /// A structural diff embedded in a change record was invalid.
    #[error(transparent)]
    Diff(#[from] jotsync_jsondiff::JsonDiffError),
}

impl ProtocolError {
    /// Creates a malformed-message error.
    pub fn malformed(kind: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            detail: detail.into(),
        }
    }
}
