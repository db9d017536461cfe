//! Ledger boundary for Transcript.
//!
//! The integrity engine commits one fingerprint per issuance (a record's own
//! fingerprint, or the Merkle root of a batch) to an external ledger and later
//! reads it back for verification. This crate provides:
//! - [`AnchorLedger`], the narrow trait the issuer calls through
//! - [`Anchor`] / [`AnchorUpdate`], the ledger-side view of one anchor
//! - [`InMemoryLedger`], a simulated ledger for tests, demos and embedding

pub mod anchor;
pub mod error;
pub mod memory;
pub mod traits;

pub use anchor::{Anchor, AnchorUpdate, LedgerStatus};
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use traits::AnchorLedger;
