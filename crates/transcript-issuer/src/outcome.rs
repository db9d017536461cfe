use std::fmt;

use serde::{Deserialize, Serialize};
use transcript_types::{Fingerprint, TxReference};

/// Why a verification did not match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationFailure {
    /// The decrypted payload no longer hashes to the fingerprint recorded at issuance.
    LocalCorruption {
        recorded: Fingerprint,
        recomputed: Fingerprint,
    },
    /// The recorded fingerprint differs from the value anchored on the ledger.
    LedgerDisagreement {
        recorded: Fingerprint,
        anchored: Fingerprint,
    },
    /// The stored proof does not lead from the record to the anchored batch root.
    BrokenInclusionProof { leaf_index: usize, root: Fingerprint },
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalCorruption { recorded, recomputed } => write!(
                f,
                "local corruption: recorded {} but payload hashes to {}",
                recorded.short_hex(),
                recomputed.short_hex()
            ),
            Self::LedgerDisagreement { recorded, anchored } => write!(
                f,
                "ledger disagreement: recorded {} but ledger holds {}",
                recorded.short_hex(),
                anchored.short_hex()
            ),
            Self::BrokenInclusionProof { leaf_index, root } => write!(
                f,
                "broken inclusion proof for leaf {leaf_index} under root {}",
                root.short_hex()
            ),
        }
    }
}

/// Result of one verification. Built fresh per call, never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub matched: bool,
    pub recomputed_fingerprint: Fingerprint,
    pub anchor_reference: TxReference,
    pub failure: Option<VerificationFailure>,
}

impl VerificationOutcome {
    /// Successful outcome.
    pub fn matched(recomputed: Fingerprint, anchor_reference: TxReference) -> Self {
        Self {
            matched: true,
            recomputed_fingerprint: recomputed,
            anchor_reference,
            failure: None,
        }
    }

    /// Failed outcome carrying the reason.
    pub fn failed(
        recomputed: Fingerprint,
        anchor_reference: TxReference,
        failure: VerificationFailure,
    ) -> Self {
        Self {
            matched: false,
            recomputed_fingerprint: recomputed,
            anchor_reference,
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_serializes_with_kind_tag() {
        let failure = VerificationFailure::BrokenInclusionProof {
            leaf_index: 1,
            root: Fingerprint::digest(b"root"),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "broken_inclusion_proof");
        assert_eq!(json["leaf_index"], 1);
    }

    #[test]
    fn failed_outcome_is_not_matched() {
        let fp = Fingerprint::digest(b"x");
        let outcome = VerificationOutcome::failed(
            fp,
            TxReference::new("tx_1"),
            VerificationFailure::LedgerDisagreement {
                recorded: fp,
                anchored: Fingerprint::digest(b"y"),
            },
        );
        assert!(!outcome.matched);
        assert!(outcome
            .failure
            .unwrap()
            .to_string()
            .starts_with("ledger disagreement"));
    }
}
