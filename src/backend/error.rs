use std::error::Error;

use thiserror::Error;

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failure reported by a room backend regardless of the transport behind it.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport or server failure; retrying later may succeed.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Short description of the failed call.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// No room matches the given id or code.
    #[error("room not found: {0}")]
    RoomNotFound(String),
    /// Both seats are already taken.
    #[error("room is full: {0}")]
    RoomFull(String),
    /// The stream or client was shut down.
    #[error("backend connection closed")]
    Closed,
}

impl BackendError {
    /// Construct an unavailable error from any transport failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        BackendError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable { .. })
    }
}
