use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use tracing::{debug, info, warn};
use transcript_crypto::{CanonicalHasher, EnvelopeCipher, EnvelopeKey, KeyProvider, MerkleTree};
use transcript_ledger::{Anchor, AnchorLedger, LedgerStatus};
use transcript_store::{
    BatchMembership, BatchRecord, Operation, RecordStore, StoredRecord, TransactionEntry,
    VerificationEntry, VerificationStatus,
};
use transcript_types::{CanonicalPayload, Fingerprint, IssuerId, RecordId};

use crate::config::IssuerConfig;
use crate::error::{IssuerError, IssuerResult};
use crate::outcome::{VerificationFailure, VerificationOutcome};
use crate::request::{BatchIssued, IssueRequest, IssuedRecord, OpenedRecord};

/// Issues and verifies anchored records for one institution.
///
/// Every issuance follows the same order: fingerprint and seal locally,
/// submit the anchor, and persist only once the ledger has accepted it. A
/// ledger failure therefore never leaves a record behind.
pub struct Issuer<L, S> {
    issuer_id: IssuerId,
    cipher: EnvelopeCipher,
    ledger: L,
    store: S,
}

impl<L: AnchorLedger, S: RecordStore> Issuer<L, S> {
    /// Issuer with a fixed envelope key.
    pub fn new(issuer_id: IssuerId, key: &EnvelopeKey, ledger: L, store: S) -> Self {
        Self {
            issuer_id,
            cipher: EnvelopeCipher::new(key),
            ledger,
            store,
        }
    }

    /// Build an issuer whose key comes from `provider`. A missing key is fatal.
    pub fn with_provider(
        issuer_id: IssuerId,
        provider: &dyn KeyProvider,
        ledger: L,
        store: S,
    ) -> IssuerResult<Self> {
        let key = provider.envelope_key()?;
        debug!(provider = provider.provider_name(), "envelope key loaded");
        Ok(Self::new(issuer_id, &key, ledger, store))
    }

    /// Issuer configured from an `IssuerConfig`. A missing key is an error.
    pub fn from_config(config: &IssuerConfig, ledger: L, store: S) -> IssuerResult<Self> {
        let provider = config.key_provider()?;
        Self::with_provider(config.issuer_id(), &provider, ledger, store)
    }

    /// Identity recorded on every submission.
    pub fn issuer_id(&self) -> &IssuerId {
        &self.issuer_id
    }

    /// The anchor ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- Issuance ----

    /// Issue one record anchored by its own fingerprint.
    ///
    /// The duplicate-id check before anchoring is not atomic with the final
    /// write. Under concurrent issuance of one id, the store rejects the
    /// second write and its anchor stays orphaned on the ledger.
    pub fn issue(&self, request: IssueRequest) -> IssuerResult<IssuedRecord> {
        let record_id = request.record_id.unwrap_or_else(RecordId::generate);
        self.ensure_vacant(&record_id)?;

        let fingerprint = CanonicalHasher::fingerprint(&request.payload);
        let envelope = self.cipher.seal(&request.payload)?;

        let tx = self.ledger.submit_anchor(&fingerprint, &self.issuer_id)?;
        let now = Utc::now();

        let record = StoredRecord {
            record_id: record_id.clone(),
            subject: request.subject,
            fingerprint,
            envelope,
            tx: tx.clone(),
            version: 1,
            batch: None,
            issued_at: now,
        };
        let entry = TransactionEntry {
            tx: tx.clone(),
            operation: Operation::Issue,
            issuer: self.issuer_id.clone(),
            anchored_value: fingerprint,
            recorded_at: now,
        };
        self.store.put_record(&record, &entry).inspect_err(|e| {
            warn!(record = %record_id, tx = %tx, error = %e, "anchored record could not be persisted");
        })?;

        info!(record = %record_id, tx = %tx, fingerprint = %fingerprint.short_hex(), "record issued");
        Ok(IssuedRecord {
            record_id,
            fingerprint,
            tx,
            leaf_index: None,
        })
    }

    /// Issue several records under one anchor: the Merkle root of their
    /// fingerprints, in request order.
    pub fn issue_batch(&self, requests: Vec<IssueRequest>) -> IssuerResult<BatchIssued> {
        if requests.is_empty() {
            return Err(IssuerError::EmptyBatch);
        }

        let mut tree = MerkleTree::new();
        let mut sealed = Vec::with_capacity(requests.len());
        let mut seen = HashSet::with_capacity(requests.len());
        for request in requests {
            let record_id = request.record_id.unwrap_or_else(RecordId::generate);
            if !seen.insert(record_id.clone()) {
                return Err(transcript_store::StoreError::Duplicate(record_id).into());
            }
            self.ensure_vacant(&record_id)?;

            let fingerprint = CanonicalHasher::fingerprint(&request.payload);
            let envelope = self.cipher.seal(&request.payload)?;
            let leaf_index = tree.add_leaf(fingerprint);
            sealed.push((leaf_index, record_id, request.subject, fingerprint, envelope));
        }
        let root = tree.root().ok_or(IssuerError::EmptyBatch)?;

        let tx = self.ledger.submit_anchor(&root, &self.issuer_id)?;
        let now = Utc::now();

        let mut records = Vec::with_capacity(sealed.len());
        let mut issued = Vec::with_capacity(sealed.len());
        for (leaf_index, record_id, subject, fingerprint, envelope) in sealed {
            issued.push(IssuedRecord {
                record_id: record_id.clone(),
                fingerprint,
                tx: tx.clone(),
                leaf_index: Some(leaf_index),
            });
            records.push(StoredRecord {
                record_id,
                subject,
                fingerprint,
                envelope,
                tx: tx.clone(),
                version: 1,
                batch: Some(BatchMembership {
                    leaf_index,
                    proof: tree.proof(leaf_index),
                }),
                issued_at: now,
            });
        }
        let batch = BatchRecord {
            tx: tx.clone(),
            root,
            leaves: tree.leaves().to_vec(),
            record_ids: issued.iter().map(|r| r.record_id.clone()).collect(),
            issued_at: now,
        };
        let entry = TransactionEntry {
            tx: tx.clone(),
            operation: Operation::BatchIssue,
            issuer: self.issuer_id.clone(),
            anchored_value: root,
            recorded_at: now,
        };
        self.store.put_batch(&batch, &records, &entry).inspect_err(|e| {
            warn!(tx = %tx, error = %e, "anchored batch could not be persisted");
        })?;

        info!(tx = %tx, root = %root.short_hex(), count = issued.len(), "batch issued");
        Ok(BatchIssued {
            tx,
            root,
            records: issued,
        })
    }

    /// Replace the payload of a single-anchor record and move its anchor to
    /// the new fingerprint. Batch records share their anchor and cannot be amended.
    ///
    /// If the store rejects the amended record, the anchor is moved back to
    /// the previous fingerprint as a further ledger version, so the stored
    /// record keeps verifying. A failed rollback is logged and the store
    /// error is still returned.
    pub fn amend(
        &self,
        record_id: &RecordId,
        payload: &CanonicalPayload,
        reason: &str,
    ) -> IssuerResult<StoredRecord> {
        let current = self.load(record_id)?;
        if current.is_batched() {
            return Err(IssuerError::BatchRecordImmutable(record_id.clone()));
        }

        let fingerprint = CanonicalHasher::fingerprint(payload);
        let envelope = self.cipher.seal(payload)?;
        let anchor = self
            .ledger
            .update_anchor(&current.tx, &fingerprint, reason, &self.issuer_id)?;

        let previous = current.fingerprint;
        let amended = StoredRecord {
            fingerprint,
            envelope,
            version: anchor.version,
            ..current
        };
        let entry = TransactionEntry {
            tx: amended.tx.clone(),
            operation: Operation::Amend,
            issuer: self.issuer_id.clone(),
            anchored_value: fingerprint,
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.store.replace_record(&amended, &entry) {
            warn!(record = %record_id, tx = %amended.tx, error = %e, "amended record could not be persisted, rolling back anchor");
            let rollback = format!("rollback: {reason}");
            if let Err(rollback_err) =
                self.ledger
                    .update_anchor(&amended.tx, &previous, &rollback, &self.issuer_id)
            {
                warn!(
                    record = %record_id,
                    tx = %amended.tx,
                    error = %rollback_err,
                    "anchor rollback failed, ledger is ahead of the stored record"
                );
            }
            return Err(e.into());
        }

        info!(record = %record_id, version = amended.version, "record amended");
        Ok(amended)
    }

    // ---- Verification ----

    /// Verify a stored record against the ledger and log the attempt.
    ///
    /// A tampered envelope is an error, not a mismatch. So is an unreachable
    /// ledger or a missing anchor; both are still logged as `Invalid`.
    pub fn verify(&self, record_id: &RecordId, requester: &str) -> IssuerResult<VerificationOutcome> {
        let record = self.load(record_id)?;
        let anchor = match self.ledger.query_anchor(&record.tx) {
            Ok(anchor) => anchor,
            Err(e) => {
                warn!(record = %record_id, tx = %record.tx, error = %e, "anchor lookup failed");
                let detail = format!("anchor lookup failed: {e}");
                if let Err(log_err) =
                    self.log_verification(record_id, requester, VerificationStatus::Invalid, Some(detail))
                {
                    warn!(record = %record_id, error = %log_err, "verification attempt not logged");
                }
                return Err(e.into());
            }
        };

        let result = self.verify_record(&record, &anchor.value);
        let (status, detail) = match &result {
            Ok(outcome) if outcome.matched => (VerificationStatus::Valid, None),
            Ok(outcome) => (
                VerificationStatus::Invalid,
                outcome.failure.as_ref().map(ToString::to_string),
            ),
            Err(e) => (VerificationStatus::Invalid, Some(e.to_string())),
        };
        self.log_verification(record_id, requester, status, detail)?;

        match &result {
            Ok(outcome) if outcome.matched => info!(record = %record_id, "record verified"),
            Ok(outcome) => warn!(
                record = %record_id,
                failure = ?outcome.failure,
                "record verification mismatch"
            ),
            Err(e) => warn!(record = %record_id, error = %e, "record verification failed"),
        }
        result
    }

    /// Check `record` against `anchored_value` without touching the collaborators.
    ///
    /// Local corruption is checked first, then either the single anchor or
    /// the inclusion proof under the batch root.
    pub fn verify_record(
        &self,
        record: &StoredRecord,
        anchored_value: &Fingerprint,
    ) -> IssuerResult<VerificationOutcome> {
        let payload = self.cipher.open(&record.envelope)?;
        let recomputed = CanonicalHasher::fingerprint(&payload);
        let tx = record.tx.clone();

        if recomputed != record.fingerprint {
            return Ok(VerificationOutcome::failed(
                recomputed,
                tx,
                VerificationFailure::LocalCorruption {
                    recorded: record.fingerprint,
                    recomputed,
                },
            ));
        }

        let failure = match &record.batch {
            None if record.fingerprint != *anchored_value => {
                Some(VerificationFailure::LedgerDisagreement {
                    recorded: record.fingerprint,
                    anchored: *anchored_value,
                })
            }
            None => None,
            Some(membership) if !membership.proof.verify(&recomputed, anchored_value) => {
                Some(VerificationFailure::BrokenInclusionProof {
                    leaf_index: membership.leaf_index,
                    root: *anchored_value,
                })
            }
            Some(_) => None,
        };

        Ok(match failure {
            Some(failure) => VerificationOutcome::failed(recomputed, tx, failure),
            None => VerificationOutcome::matched(recomputed, tx),
        })
    }

    // ---- Queries ----

    /// Decrypt a record for an authorized caller.
    pub fn open_record(&self, record_id: &RecordId) -> IssuerResult<OpenedRecord> {
        let record = self.load(record_id)?;
        let payload = self.cipher.open(&record.envelope)?;
        debug!(record = %record_id, "record opened");
        Ok(OpenedRecord { record, payload })
    }

    /// Stored metadata of a record, without decrypting it.
    pub fn record(&self, record_id: &RecordId) -> IssuerResult<StoredRecord> {
        self.load(record_id)
    }

    /// All stored record ids.
    pub fn record_ids(&self) -> IssuerResult<Vec<RecordId>> {
        Ok(self.store.list_records()?)
    }

    /// Transaction log, newest first.
    pub fn transactions(&self) -> IssuerResult<Vec<TransactionEntry>> {
        Ok(self.store.transactions()?)
    }

    /// Verification log for one record, oldest first.
    pub fn verifications(&self, record_id: &RecordId) -> IssuerResult<Vec<VerificationEntry>> {
        Ok(self.store.verifications(record_id)?)
    }

    /// Every ledger version of the anchor behind `record_id`, oldest first.
    pub fn anchor_history(&self, record_id: &RecordId) -> IssuerResult<Vec<Anchor>> {
        let record = self.load(record_id)?;
        Ok(self.ledger.anchor_history(&record.tx)?)
    }

    /// Ledger connectivity as reported by the ledger itself.
    pub fn ledger_health(&self) -> LedgerStatus {
        self.ledger.check_connection()
    }

    fn load(&self, record_id: &RecordId) -> IssuerResult<StoredRecord> {
        self.store
            .get_record(record_id)?
            .ok_or_else(|| IssuerError::RecordNotFound(record_id.clone()))
    }

    fn log_verification(
        &self,
        record_id: &RecordId,
        requester: &str,
        status: VerificationStatus,
        detail: Option<String>,
    ) -> IssuerResult<()> {
        self.store.append_verification(&VerificationEntry {
            record_id: record_id.clone(),
            requester: requester.to_string(),
            status,
            detail,
            recorded_at: Utc::now(),
        })?;
        Ok(())
    }

    /// Early duplicate check so no anchor is submitted for an id that is
    /// already taken.
    ///
    /// Best effort only: two concurrent issuances of the same id can both
    /// pass it. The store's `put_record` is the authoritative check, and the
    /// loser then leaves an orphaned anchor on the ledger.
    fn ensure_vacant(&self, record_id: &RecordId) -> IssuerResult<()> {
        if self.store.exists(record_id)? {
            return Err(transcript_store::StoreError::Duplicate(record_id.clone()).into());
        }
        Ok(())
    }
}

impl<L, S> fmt::Debug for Issuer<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issuer")
            .field("issuer_id", &self.issuer_id)
            .finish_non_exhaustive()
    }
}
