use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Input cannot be represented as a canonical payload.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}
