//! Error types for the API client.
//!
//! # Design
//! Every failure a verb call can hit has its own variant so callers can tell
//! a clock problem from a network problem from a payload problem. Non-2xx
//! responses keep the raw status and body for inspection.

use thiserror::Error;

use crate::http::TransportError;

/// Errors returned by `Client` and the components it drives.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `/auth/time` was unreachable or returned something that is not a
    /// Unix timestamp.
    #[error("time sync failed: {0}")]
    TimeSync(String),

    /// The transport failed before an HTTP status was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The server returned a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Client configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status carried by `Http`, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transport(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_for_http_errors() {
        let err = ApiError::Http {
            status: 404,
            body: r#"{"message":"not found"}"#.to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert_eq!(ApiError::TimeSync("down".to_string()).status(), None);
    }

    #[test]
    fn transport_error_converts() {
        let err: ApiError = TransportError("connection refused".to_string()).into();
        assert!(matches!(err, ApiError::Transport(ref msg) if msg == "connection refused"));
        assert_eq!(err.to_string(), "transport error: connection refused");
    }
}
