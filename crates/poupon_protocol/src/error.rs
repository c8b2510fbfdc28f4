//! Error types for payload handling.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or reading wire payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The body was not valid JSON or did not match the expected envelope.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field the platform always sends was missing or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl ProtocolError {
    /// Creates a missing-field error.
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField(field)
    }
}
