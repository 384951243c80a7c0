//! Redaction error types.

use thiserror::Error;

use super::types::RedactionViolation;
use crate::storage::StorageError;

/// Redaction session errors.
#[derive(Debug, Error)]
pub enum RedactionError {
    /// Source bytes are not a readable PDF.
    #[error("document could not be decoded: {0}")]
    DocumentDecode(String),

    /// Redacted document could not be serialized.
    #[error("document could not be encoded: {0}")]
    DocumentEncode(String),

    /// Unknown id, or idle past the session TTL.
    #[error("redaction session not found or expired: {session_id}")]
    SessionNotFoundOrExpired {
        /// Session identifier.
        session_id: String,
    },

    /// One or more rectangles are invalid. Nothing was changed.
    #[error("{} invalid redaction(s)", .violations.len())]
    Validation {
        /// Every problem found.
        violations: Vec<RedactionViolation>,
    },

    /// Save called before any successful apply.
    #[error("session {session_id} has no redacted output to save")]
    NothingToSave {
        /// Session identifier.
        session_id: String,
    },

    /// Invalid redaction configuration.
    #[error("redaction configuration error: {0}")]
    Configuration(String),

    /// A blocking document task panicked or was cancelled.
    #[error("document worker failed: {0}")]
    Worker(String),

    /// Gateway failure while loading or saving.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RedactionError {
    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DocumentDecode(msg.into())
    }

    /// Create an encode error.
    #[must_use]
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::DocumentEncode(msg.into())
    }

    /// Create a not-found-or-expired error.
    #[must_use]
    pub fn session_not_found(session_id: &str) -> Self {
        Self::SessionNotFoundOrExpired {
            session_id: session_id.to_string(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub const fn validation(violations: Vec<RedactionViolation>) -> Self {
        Self::Validation { violations }
    }
}

impl From<tokio::task::JoinError> for RedactionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}
