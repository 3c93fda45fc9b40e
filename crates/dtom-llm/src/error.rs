//! Error types for the chat collaborator

use dtom_core::ServiceError;
use thiserror::Error;

/// Result type for chat client operations
pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat reply had no message content")]
    EmptyReply,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for ServiceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(secs) => ServiceError::Timeout(secs),
            LlmError::EmptyReply => ServiceError::MalformedReply(err.to_string()),
            other => ServiceError::Unavailable(other.to_string()),
        }
    }
}
