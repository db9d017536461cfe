use transcript_types::{RecordId, TxReference};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("record already exists: {0}")]
    Duplicate(RecordId),

    #[error("batch already exists for transaction {0}")]
    DuplicateBatch(TxReference),

    /// The batch and its records disagree (count, order or transaction).
    #[error("inconsistent batch: {0}")]
    InconsistentBatch(String),

    /// Storage backend is unavailable or its state is unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
