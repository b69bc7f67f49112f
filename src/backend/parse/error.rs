//! Error types raised by the Parse REST client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::backend::BackendError;

/// Convenient result alias returning [`ParseError`] failures.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error code for a missing object.
const OBJECT_NOT_FOUND: i64 = 101;

/// Failures that can occur while talking to a Parse server.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Required environment variable is missing.
    #[error("missing Parse environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Environment variable is present but unusable.
    #[error("invalid value {value:?} for Parse environment variable `{var}`")]
    InvalidEnvVar { var: &'static str, value: String },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Parse client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send Parse request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with an unexpected status and no Parse error body.
    #[error("unexpected Parse response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The requested object does not exist.
    #[error("Parse object not found at `{path}`")]
    NotFound { path: String },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Parse response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Cloud code reported an error.
    #[error("cloud function `{function}` failed ({code}): {message}")]
    CloudFunction {
        function: String,
        code: i64,
        message: String,
    },
}

impl ParseError {
    /// Map an error body returned by the server for `path`.
    pub(crate) fn from_body(path: &str, status: StatusCode, code: i64, message: String) -> Self {
        if code == OBJECT_NOT_FOUND || status == StatusCode::NOT_FOUND {
            return ParseError::NotFound {
                path: path.to_string(),
            };
        }
        match path.strip_prefix("functions/") {
            Some(function) => ParseError::CloudFunction {
                function: function.to_string(),
                code,
                message,
            },
            None => ParseError::RequestStatus {
                path: path.to_string(),
                status,
            },
        }
    }
}

impl From<ParseError> for BackendError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::NotFound { path } => BackendError::RoomNotFound(path),
            ParseError::CloudFunction { message, .. } if is_full_room(&message) => {
                BackendError::RoomFull(message)
            }
            ParseError::CloudFunction { message, .. } if is_missing_room(&message) => {
                BackendError::RoomNotFound(message)
            }
            ParseError::CloudFunction { message, .. } => BackendError::Rejected(message),
            other => BackendError::unavailable(other.to_string(), other),
        }
    }
}

fn is_full_room(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("full") || message.contains("llena")
}

fn is_missing_room(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("not found") || message.contains("no existe")
}
