use serde::{Deserialize, Serialize};
use transcript_store::StoredRecord;
use transcript_types::{CanonicalPayload, Fingerprint, RecordId, TxReference};

/// One record to issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueRequest {
    /// Caller-assigned id; generated when absent.
    #[serde(default)]
    pub record_id: Option<RecordId>,
    pub subject: String,
    pub payload: CanonicalPayload,
}

impl IssueRequest {
    /// Request with a generated record id.
    pub fn new(subject: impl Into<String>, payload: CanonicalPayload) -> Self {
        Self {
            record_id: None,
            subject: subject.into(),
            payload,
        }
    }

    /// Use a caller-chosen record id.
    pub fn with_record_id(mut self, id: RecordId) -> Self {
        self.record_id = Some(id);
        self
    }
}

/// Receipt for one issued record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedRecord {
    pub record_id: RecordId,
    pub fingerprint: Fingerprint,
    pub tx: TxReference,
    /// Position under the batch root, for batch issuance.
    pub leaf_index: Option<usize>,
}

/// Receipt for a batch issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchIssued {
    pub tx: TxReference,
    pub root: Fingerprint,
    pub records: Vec<IssuedRecord>,
}

/// A decrypted record with its stored metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenedRecord {
    pub record: StoredRecord,
    pub payload: CanonicalPayload,
}
