//! Foundation types for Transcript.
//!
//! Every other Transcript crate depends on `transcript-types`.
//!
//! # Key Types
//!
//! - [`Fingerprint`]: SHA-256 content digest, rendered as 64 lowercase hex chars
//! - [`CanonicalPayload`]: a record's content as a key-sorted mapping
//! - [`PayloadValue`]: the fixed recursive value type payloads are built from
//! - [`RecordId`]: caller-assigned record identifier
//! - [`TxReference`]: opaque transaction reference returned by the ledger
//! - [`IssuerId`]: identity of the issuing institution

pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod payload;

pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use identity::{IssuerId, RecordId, TxReference};
pub use payload::{CanonicalPayload, PayloadValue};
