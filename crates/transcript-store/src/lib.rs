//! Record storage for Transcript.
//!
//! Persists what verification needs later: the sealed envelope, the recorded
//! fingerprint, the ledger transaction reference and, for batch records, the
//! leaf index plus inclusion proof. The store never decrypts or interprets
//! envelopes.
//!
//! # Design Rules
//!
//! 1. Each `put_*` call is atomic: a record and its transaction log entry are
//!    written together or not at all.
//! 2. Records are never overwritten by `put_record`; amendments go through
//!    `replace_record`, which requires the record to exist.
//! 3. Concurrent reads are always safe.

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use record::{
    BatchMembership, BatchRecord, Operation, StoredRecord, TransactionEntry, VerificationEntry,
    VerificationStatus,
};
pub use traits::RecordStore;
