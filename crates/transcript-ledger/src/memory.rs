use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info, warn};
use transcript_types::{Fingerprint, IssuerId, TxReference};

use crate::anchor::{Anchor, AnchorUpdate, LedgerStatus};
use crate::error::LedgerError;
use crate::traits::AnchorLedger;

const DEFAULT_CHANNEL: &str = "educationchannel";
const DEFAULT_CONTRACT: &str = "education_contract";

/// Simulated ledger for tests, local demos, and embedding.
///
/// Anchors live in memory keyed by a generated transaction reference. Each
/// key keeps its full version history, newest last. Availability and
/// rejection can be toggled to exercise the issuer's failure paths.
pub struct InMemoryLedger {
    channel: String,
    contract: String,
    available: AtomicBool,
    rejection: RwLock<Option<String>>,
    anchors: RwLock<HashMap<TxReference, Vec<Anchor>>>,
}

impl InMemoryLedger {
    /// Empty ledger, available and accepting submissions.
    pub fn new() -> Self {
        Self::with_network(DEFAULT_CHANNEL, DEFAULT_CONTRACT)
    }

    /// A simulated ledger labelled with the channel and contract it stands in for.
    pub fn with_network(channel: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            contract: contract.into(),
            available: AtomicBool::new(true),
            rejection: RwLock::new(None),
            anchors: RwLock::new(HashMap::new()),
        }
    }

    /// Make every subsequent call fail with [`LedgerError::Unavailable`] (or stop doing so).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Reject subsequent submissions and updates with `reason`.
    pub fn reject_submissions(&self, reason: impl Into<String>) {
        if let Ok(mut rejection) = self.rejection.write() {
            *rejection = Some(reason.into());
        }
    }

    /// Accept submissions again after [`reject_submissions`](Self::reject_submissions).
    pub fn accept_submissions(&self) {
        if let Ok(mut rejection) = self.rejection.write() {
            *rejection = None;
        }
    }

    /// Number of distinct anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.read().map(|a| a.len()).unwrap_or(0)
    }

    fn ensure_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable(format!(
                "simulated ledger on channel {} is offline",
                self.channel
            )))
        }
    }

    fn ensure_accepting(&self) -> Result<(), LedgerError> {
        let rejection = self
            .rejection
            .read()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))?;
        match rejection.as_ref() {
            Some(reason) => Err(LedgerError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn read_anchors(&self) -> Result<RwLockReadGuard<'_, HashMap<TxReference, Vec<Anchor>>>, LedgerError> {
        self.anchors
            .read()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))
    }

    fn write_anchors(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<TxReference, Vec<Anchor>>>, LedgerError> {
        self.anchors
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorLedger for InMemoryLedger {
    fn submit_anchor(
        &self,
        value: &Fingerprint,
        issuer: &IssuerId,
    ) -> Result<TxReference, LedgerError> {
        self.ensure_available()?;
        if let Err(e) = self.ensure_accepting() {
            warn!(issuer = %issuer, error = %e, "anchor submission rejected");
            return Err(e);
        }

        let tx = TxReference::new(format!("tx_{}", uuid::Uuid::now_v7().simple()));
        let anchor = Anchor {
            tx: tx.clone(),
            value: *value,
            issuer: issuer.clone(),
            anchored_at: Utc::now(),
            version: 1,
            updates: Vec::new(),
        };

        let mut anchors = self.write_anchors()?;
        if anchors.contains_key(&tx) {
            return Err(LedgerError::Rejected(format!("transaction {tx} already exists")));
        }
        anchors.insert(tx.clone(), vec![anchor]);

        info!(tx = %tx, anchor = %value.short_hex(), issuer = %issuer, "anchor submitted");
        Ok(tx)
    }

    fn query_anchor(&self, tx: &TxReference) -> Result<Anchor, LedgerError> {
        self.ensure_available()?;
        let anchors = self.read_anchors()?;
        let anchor = anchors
            .get(tx)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(tx.clone()))?;
        debug!(tx = %tx, version = anchor.version, "anchor queried");
        Ok(anchor)
    }

    fn update_anchor(
        &self,
        tx: &TxReference,
        new_value: &Fingerprint,
        reason: &str,
        updated_by: &IssuerId,
    ) -> Result<Anchor, LedgerError> {
        self.ensure_available()?;
        self.ensure_accepting()?;

        let mut anchors = self.write_anchors()?;
        let history = anchors
            .get_mut(tx)
            .ok_or_else(|| LedgerError::NotFound(tx.clone()))?;
        let current = history
            .last()
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(tx.clone()))?;

        let mut updated = current.clone();
        updated.updates.push(AnchorUpdate {
            previous_value: current.value,
            new_value: *new_value,
            reason: reason.to_string(),
            updated_by: updated_by.clone(),
            updated_at: Utc::now(),
        });
        updated.value = *new_value;
        updated.version = current.version + 1;
        history.push(updated.clone());

        info!(tx = %tx, version = updated.version, "anchor updated");
        Ok(updated)
    }

    fn anchor_history(&self, tx: &TxReference) -> Result<Vec<Anchor>, LedgerError> {
        self.ensure_available()?;
        let anchors = self.read_anchors()?;
        anchors
            .get(tx)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(tx.clone()))
    }

    fn check_connection(&self) -> LedgerStatus {
        let connected = self.available.load(Ordering::SeqCst);
        LedgerStatus {
            connected,
            detail: format!(
                "simulated ledger (channel {}, contract {}){}",
                self.channel,
                self.contract,
                if connected { "" } else { " offline" }
            ),
        }
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("channel", &self.channel)
            .field("contract", &self.contract)
            .field("anchor_count", &self.anchor_count())
            .finish()
    }
}
