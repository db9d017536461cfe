use transcript_types::TxReference;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The ledger could not be reached. Callers may retry with backoff.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the submission. Retrying will not help.
    #[error("ledger rejected submission: {0}")]
    Rejected(String),

    #[error("anchor not found for transaction {0}")]
    NotFound(TxReference),
}

impl LedgerError {
    /// Whether the failure is transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
