use thiserror::Error;

use crate::{backend::BackendError, state::RoomId};

/// Errors returned by the session and lobby services.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Room codes are exactly four digits.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
    /// `init_session` was already called for this controller.
    #[error("session already started for room {0}")]
    AlreadyStarted(RoomId),
    /// Operation needs a started session.
    #[error("session not started")]
    NotStarted,
    /// The session was left.
    #[error("session closed")]
    Closed,
}

/// Errors raised while decoding backend payloads.
#[derive(Debug, Error)]
pub enum WireError {
    /// The envelope carried an event type this client does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    /// A field the event cannot be applied without is missing.
    #[error("{event} payload is missing `{field}`")]
    MissingField {
        /// Event type.
        event: &'static str,
        /// Missing field.
        field: &'static str,
    },
    /// Payload is not valid JSON for the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}
