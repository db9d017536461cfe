use thiserror::Error;
use transcript_crypto::{EnvelopeError, KeyError};
use transcript_ledger::LedgerError;
use transcript_store::StoreError;
use transcript_types::{RecordId, TypeError};

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error(transparent)]
    Payload(#[from] TypeError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("batch issuance requires at least one record")]
    EmptyBatch,

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("record {0} belongs to a batch and cannot be amended")]
    BatchRecordImmutable(RecordId),
}

impl IssuerError {
    /// Tampered envelope or wrong key.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Envelope(EnvelopeError::Authentication))
    }

    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_transient())
    }
}

pub type IssuerResult<T> = Result<T, IssuerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_is_detected() {
        let err = IssuerError::from(EnvelopeError::Authentication);
        assert!(err.is_authentication_failure());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "envelope authentication failed");
    }

    #[test]
    fn only_unavailable_ledger_is_retryable() {
        assert!(IssuerError::from(LedgerError::Unavailable("down".into())).is_retryable());
        assert!(!IssuerError::from(LedgerError::Rejected("dup".into())).is_retryable());
        assert!(!IssuerError::EmptyBatch.is_retryable());
    }

    #[test]
    fn wrapped_errors_display_once() {
        let err = IssuerError::from(TypeError::MalformedPayload("expected object".into()));
        assert_eq!(err.to_string(), "malformed payload: expected object");

        let err = IssuerError::from(LedgerError::Unavailable("down".into()));
        assert_eq!(err.to_string(), "ledger unavailable: down");

        let err = IssuerError::from(StoreError::Unavailable("disk full".into()));
        assert_eq!(err.to_string(), "store unavailable: disk full");
    }
}
