use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transcript_crypto::{EncryptedEnvelope, MerkleProof};
use transcript_types::{Fingerprint, IssuerId, RecordId, TxReference};

/// One issued record as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record_id: RecordId,
    /// Student (or other subject) the record is about.
    pub subject: String,
    /// Fingerprint recorded at issuance.
    pub fingerprint: Fingerprint,
    pub envelope: EncryptedEnvelope,
    pub tx: TxReference,
    /// Starts at 1; bumped by amendments.
    pub version: u32,
    /// Present when the record was anchored as part of a batch.
    pub batch: Option<BatchMembership>,
    pub issued_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Whether the record was issued as part of a batch.
    pub fn is_batched(&self) -> bool {
        self.batch.is_some()
    }
}

/// What a batch record needs to prove its own inclusion under the batch root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMembership {
    pub leaf_index: usize,
    pub proof: MerkleProof,
}

/// One batch issuance: the anchored root and the ordered leaves under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub tx: TxReference,
    pub root: Fingerprint,
    /// Leaf fingerprints in tree order.
    pub leaves: Vec<Fingerprint>,
    /// Record ids in the same order as `leaves`.
    pub record_ids: Vec<RecordId>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Issue,
    BatchIssue,
    Amend,
}

/// Transaction log entry, one per ledger interaction that changed an anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub tx: TxReference,
    pub operation: Operation,
    pub issuer: IssuerId,
    /// Record fingerprint or batch root.
    pub anchored_value: Fingerprint,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Valid,
    Invalid,
}

/// Audit entry written for every verification request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub record_id: RecordId,
    pub requester: String,
    pub status: VerificationStatus,
    /// Why verification failed, if it did.
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
