//! Integrity engine for Transcript.
//!
//! Provides canonical SHA-256 content fingerprints, the ChaCha20-Poly1305
//! envelope that protects payloads at rest, and binary Merkle trees whose
//! roots let a whole batch of records share one ledger anchor.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod canonical;
pub mod envelope;
pub mod key;
pub mod merkle;

pub use canonical::CanonicalHasher;
pub use envelope::{EncryptedEnvelope, EnvelopeCipher, EnvelopeError};
pub use key::{EnvKeyProvider, EnvelopeKey, KeyError, KeyProvider, StaticKeyProvider};
pub use merkle::{hash_pair, merkle_root, verify_proof, MerkleProof, MerkleTree, ProofStep, Side, TreeState};
