use transcript_types::{Fingerprint, IssuerId, TxReference};

use crate::anchor::{Anchor, LedgerStatus};
use crate::error::LedgerError;

/// Boundary to the external ledger that holds anchors.
///
/// Calls are synchronous and fallible from the issuer's point of view; the
/// implementation may block on I/O. The issuer never retries internally.
pub trait AnchorLedger: Send + Sync {
    /// Commit `value` on behalf of `issuer` and return the transaction reference.
    fn submit_anchor(&self, value: &Fingerprint, issuer: &IssuerId)
        -> Result<TxReference, LedgerError>;

    /// Current state of the anchor committed under `tx`.
    fn query_anchor(&self, tx: &TxReference) -> Result<Anchor, LedgerError>;

    /// Replace the anchored value under `tx`, bumping its version and
    /// appending to its update log. Returns the updated anchor.
    fn update_anchor(
        &self,
        tx: &TxReference,
        new_value: &Fingerprint,
        reason: &str,
        updated_by: &IssuerId,
    ) -> Result<Anchor, LedgerError>;

    /// Every version of the anchor under `tx`, oldest first.
    fn anchor_history(&self, tx: &TxReference) -> Result<Vec<Anchor>, LedgerError>;

    /// Reachability check. Never fails; unreachable ledgers report it in the status.
    fn check_connection(&self) -> LedgerStatus;
}
