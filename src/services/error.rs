//! Error taxonomy of the messaging core.

use thiserror::Error;

use crate::domain::ThreadId;

/// Errors surfaced by the messaging services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagingError {
    /// Input rejected before any backend call.
    #[error("invalid message: {0}")]
    Validation(String),

    /// The requested thread does not exist.
    #[error("thread not found: {0}")]
    NotFound(ThreadId),

    /// A live subscription failed to open or dropped.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// A write was not acknowledged by the backend.
    #[error("message not sent: {0}")]
    WriteFailure(String),

    /// A one-shot detail fetch failed or timed out.
    #[error("thread details unavailable: {0}")]
    DetailFetch(String),
}

impl MessagingError {
    /// Returns true if repeating the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MessagingError::Subscription(_)
                | MessagingError::WriteFailure(_)
                | MessagingError::DetailFetch(_)
        )
    }
}

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;
