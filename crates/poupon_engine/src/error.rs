//! Error types for the engine.

use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while talking to the platform.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No usable credential was supplied to `authenticate`.
    #[error("a long-lived secret or a username/password pair must be provided")]
    MissingCredentials,

    /// An authenticated call was attempted before a token was derived.
    #[error("session has no short-lived token; authenticate first")]
    NotAuthenticated,

    /// Login or token exchange was rejected.
    #[error("authentication failed with status {status}: {body}")]
    Authentication {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Too many credential exchange attempts.
    #[error("too many login requests; check your credentials and retry in {} s", retry_secs(.retry_after))]
    RateLimited {
        /// Server-suggested wait, if sent.
        retry_after: Option<Duration>,
    },

    /// A resource call returned a non-success status.
    #[error("api error {status}{}: {body}", reason_suffix(.status))]
    Api {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A polled task reported failure.
    #[error("task failed with status {status}{}", message_suffix(.message))]
    TaskFailed {
        /// Raw status reported by the server.
        status: String,
        /// Server message, if any.
        message: Option<String>,
    },

    /// The transport could not complete the request.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// A response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(#[from] poupon_protocol::ProtocolError),

    /// A bounded poll ran out of time.
    #[error("timed out after {elapsed:?} waiting for {what}")]
    Timeout {
        /// What was being waited on.
        what: String,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// The workflow was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Authentication { status, .. } | EngineError::Api { status, .. } => {
                Some(*status)
            }
            EngineError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

fn retry_secs(retry_after: &Option<Duration>) -> u64 {
    retry_after.map_or(60, |d| d.as_secs())
}

fn reason_suffix(status: &u16) -> String {
    status_reason(*status)
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// Describes well-known platform status codes.
pub fn status_reason(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("the request could not be understood or was missing required parameters"),
        401 => Some("authentication failed or user lacks permission for the operation"),
        403 => Some("access denied to this resource"),
        404 => Some("resource was not found"),
        405 => Some("requested method is not supported for the resource"),
        429 => Some("exceeded API limits"),
        503 => Some("service temporarily unavailable, try again later"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = EngineError::Api {
            status: 404,
            body: "{}".into(),
        };
        assert_eq!(err.to_string(), "api error 404 (resource was not found): {}");

        let err = EngineError::Api {
            status: 418,
            body: "teapot".into(),
        };
        assert_eq!(err.to_string(), "api error 418: teapot");
    }

    #[test]
    fn task_failed_display() {
        let err = EngineError::TaskFailed {
            status: "ERROR".into(),
            message: Some("import failed".into()),
        };
        assert_eq!(err.to_string(), "task failed with status ERROR: import failed");

        let err = EngineError::TaskFailed {
            status: "ERROR".into(),
            message: None,
        };
        assert_eq!(err.to_string(), "task failed with status ERROR");
    }

    #[test]
    fn rate_limit_display() {
        let err = EngineError::RateLimited { retry_after: None };
        assert!(err.to_string().contains("60 s"));
        let err = EngineError::RateLimited {
            retry_after: Some(Duration::from_secs(90)),
        };
        assert!(err.to_string().contains("90 s"));
        assert_eq!(err.status(), Some(429));
    }
}
