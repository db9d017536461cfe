use transcript_types::{RecordId, TxReference};

use crate::error::StoreResult;
use crate::record::{BatchRecord, StoredRecord, TransactionEntry, VerificationEntry};

/// Persistence boundary for issued records.
///
/// All implementations must satisfy these invariants:
/// - `put_record` and `put_batch` are atomic: either every record and the
///   transaction entry become visible, or none do.
/// - Existing records are never silently overwritten.
/// - Concurrent reads are always safe.
pub trait RecordStore: Send + Sync {
    /// Persist a newly issued record together with its transaction log entry.
    ///
    /// Fails with `Duplicate` if the record id is already taken.
    fn put_record(&self, record: &StoredRecord, entry: &TransactionEntry) -> StoreResult<()>;

    /// Persist a batch, all of its records, and its transaction log entry.
    fn put_batch(
        &self,
        batch: &BatchRecord,
        records: &[StoredRecord],
        entry: &TransactionEntry,
    ) -> StoreResult<()>;

    /// Replace an existing record (amendment) and log the transaction.
    ///
    /// Fails with `NotFound` if the record does not exist.
    fn replace_record(&self, record: &StoredRecord, entry: &TransactionEntry) -> StoreResult<()>;

    /// Returns `Ok(None)` if the record does not exist.
    fn get_record(&self, id: &RecordId) -> StoreResult<Option<StoredRecord>>;

    fn get_batch(&self, tx: &TxReference) -> StoreResult<Option<BatchRecord>>;

    /// All record ids in ascending order.
    fn list_records(&self) -> StoreResult<Vec<RecordId>>;

    /// Transaction log, newest first.
    fn transactions(&self) -> StoreResult<Vec<TransactionEntry>>;

    fn append_verification(&self, entry: &VerificationEntry) -> StoreResult<()>;

    /// Verification log for one record, oldest first.
    fn verifications(&self, id: &RecordId) -> StoreResult<Vec<VerificationEntry>>;

    fn exists(&self, id: &RecordId) -> StoreResult<bool> {
        Ok(self.get_record(id)?.is_some())
    }
}
