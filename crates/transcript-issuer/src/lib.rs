//! Anchoring and verification protocol for Transcript.
//!
//! [`Issuer`] ties the integrity engine to its two collaborators: it
//! fingerprints and seals payloads, commits one anchor per issuance to an
//! [`AnchorLedger`](transcript_ledger::AnchorLedger), and only then persists
//! the sealed records in a [`RecordStore`](transcript_store::RecordStore).
//! Verification reopens a record, recomputes its fingerprint and checks it
//! against the ledger, through a Merkle inclusion proof for batch records.

pub mod config;
pub mod error;
pub mod issuer;
pub mod outcome;
pub mod request;

pub use config::{ConfigError, EnvelopeConfig, InstitutionConfig, IssuerConfig, LedgerConfig};
pub use error::{IssuerError, IssuerResult};
pub use issuer::Issuer;
pub use outcome::{VerificationFailure, VerificationOutcome};
pub use request::{BatchIssued, IssueRequest, IssuedRecord, OpenedRecord};

// Re-export the types callers need to drive an issuer.
pub use transcript_crypto::{EnvelopeKey, MerkleProof};
pub use transcript_ledger::{AnchorLedger, InMemoryLedger, LedgerStatus};
pub use transcript_store::{InMemoryRecordStore, RecordStore, StoredRecord};
pub use transcript_types::{CanonicalPayload, Fingerprint, IssuerId, PayloadValue, RecordId, TxReference};
