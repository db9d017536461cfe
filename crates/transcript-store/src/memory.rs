use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use transcript_types::{RecordId, TxReference};

use crate::error::{StoreError, StoreResult};
use crate::record::{BatchRecord, StoredRecord, TransactionEntry, VerificationEntry};
use crate::traits::RecordStore;

/// In-memory record store.
///
/// Intended for tests and embedding. All state sits behind one `RwLock`, so
/// every multi-part write is applied under a single write guard.
pub struct InMemoryRecordStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    records: BTreeMap<RecordId, StoredRecord>,
    batches: HashMap<TxReference, BatchRecord>,
    transactions: Vec<TransactionEntry>,
    verifications: Vec<VerificationEntry>,
}

impl InMemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put_record(&self, record: &StoredRecord, entry: &TransactionEntry) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.records.contains_key(&record.record_id) {
            return Err(StoreError::Duplicate(record.record_id.clone()));
        }
        state
            .records
            .insert(record.record_id.clone(), record.clone());
        state.transactions.push(entry.clone());
        debug!(record = %record.record_id, tx = %record.tx, "record stored");
        Ok(())
    }

    fn put_batch(
        &self,
        batch: &BatchRecord,
        records: &[StoredRecord],
        entry: &TransactionEntry,
    ) -> StoreResult<()> {
        validate_batch(batch, records)?;

        let mut state = self.write()?;
        if state.batches.contains_key(&batch.tx) {
            return Err(StoreError::DuplicateBatch(batch.tx.clone()));
        }
        if let Some(taken) = records
            .iter()
            .find(|r| state.records.contains_key(&r.record_id))
        {
            return Err(StoreError::Duplicate(taken.record_id.clone()));
        }

        for record in records {
            state
                .records
                .insert(record.record_id.clone(), record.clone());
        }
        state.batches.insert(batch.tx.clone(), batch.clone());
        state.transactions.push(entry.clone());
        debug!(tx = %batch.tx, count = records.len(), "batch stored");
        Ok(())
    }

    fn replace_record(&self, record: &StoredRecord, entry: &TransactionEntry) -> StoreResult<()> {
        let mut state = self.write()?;
        let slot = state
            .records
            .get_mut(&record.record_id)
            .ok_or_else(|| StoreError::NotFound(record.record_id.clone()))?;
        *slot = record.clone();
        state.transactions.push(entry.clone());
        debug!(record = %record.record_id, version = record.version, "record replaced");
        Ok(())
    }

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<StoredRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn get_batch(&self, tx: &TxReference) -> StoreResult<Option<BatchRecord>> {
        Ok(self.read()?.batches.get(tx).cloned())
    }

    fn list_records(&self) -> StoreResult<Vec<RecordId>> {
        Ok(self.read()?.records.keys().cloned().collect())
    }

    fn transactions(&self) -> StoreResult<Vec<TransactionEntry>> {
        Ok(self.read()?.transactions.iter().rev().cloned().collect())
    }

    fn append_verification(&self, entry: &VerificationEntry) -> StoreResult<()> {
        self.write()?.verifications.push(entry.clone());
        Ok(())
    }

    fn verifications(&self, id: &RecordId) -> StoreResult<Vec<VerificationEntry>> {
        Ok(self
            .read()?
            .verifications
            .iter()
            .filter(|v| &v.record_id == id)
            .cloned()
            .collect())
    }
}

fn validate_batch(batch: &BatchRecord, records: &[StoredRecord]) -> StoreResult<()> {
    if records.is_empty() {
        return Err(StoreError::InconsistentBatch("batch has no records".into()));
    }
    if records.len() != batch.leaves.len() || records.len() != batch.record_ids.len() {
        return Err(StoreError::InconsistentBatch(format!(
            "{} records for {} leaves and {} ids",
            records.len(),
            batch.leaves.len(),
            batch.record_ids.len()
        )));
    }

    let mut seen = HashSet::new();
    for (i, record) in records.iter().enumerate() {
        if !seen.insert(&record.record_id) {
            return Err(StoreError::Duplicate(record.record_id.clone()));
        }
        if record.tx != batch.tx {
            return Err(StoreError::InconsistentBatch(format!(
                "record {} carries transaction {}, batch has {}",
                record.record_id, record.tx, batch.tx
            )));
        }
        if record.record_id != batch.record_ids[i] || record.fingerprint != batch.leaves[i] {
            return Err(StoreError::InconsistentBatch(format!(
                "record {} is out of order at leaf {i}",
                record.record_id
            )));
        }
        match &record.batch {
            Some(membership) if membership.leaf_index == i => {}
            _ => {
                return Err(StoreError::InconsistentBatch(format!(
                    "record {} lacks membership for leaf {i}",
                    record.record_id
                )))
            }
        }
    }
    Ok(())
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}
