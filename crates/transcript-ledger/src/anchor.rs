use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transcript_types::{Fingerprint, IssuerId, TxReference};

/// Ledger-side view of one anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub tx: TxReference,
    /// A record fingerprint, or the Merkle root of a batch.
    pub value: Fingerprint,
    pub issuer: IssuerId,
    pub anchored_at: DateTime<Utc>,
    /// Starts at 1 and increases with every update.
    pub version: u32,
    pub updates: Vec<AnchorUpdate>,
}

/// One entry of an anchor's update log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorUpdate {
    pub previous_value: Fingerprint,
    pub new_value: Fingerprint,
    pub reason: String,
    pub updated_by: IssuerId,
    pub updated_at: DateTime<Utc>,
}

/// Connectivity reported by [`AnchorLedger::check_connection`](crate::AnchorLedger::check_connection).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatus {
    pub connected: bool,
    pub detail: String,
}
