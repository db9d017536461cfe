//! Authenticated encryption of record payloads at rest.
//!
//! Envelope layout: `version (1) || nonce (12) || ciphertext || tag (16)`.
//! The version byte is bound as associated data, so every byte of the envelope
//! is covered by the Poly1305 tag. The plaintext is exactly the canonical
//! encoding from [`CanonicalHasher`], so a fingerprint recomputed after
//! [`EnvelopeCipher::open`] equals the one computed before sealing.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use transcript_types::{CanonicalPayload, TypeError};

use crate::canonical::CanonicalHasher;
use crate::key::EnvelopeKey;

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Opaque authenticated ciphertext protecting one record's payload.
///
/// Serializes as a lowercase hex string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncryptedEnvelope(Vec<u8>);

impl EncryptedEnvelope {
    /// Wrap raw envelope bytes. Nothing is validated until [`EnvelopeCipher::open`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw envelope bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Envelope length in bytes, header and tag included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex of the whole envelope.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse a hex envelope. Structure is only checked on `open`.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| TypeError::InvalidHex(e.to_string()))
    }
}

impl fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedEnvelope({} bytes)", self.0.len())
    }
}

impl TryFrom<String> for EncryptedEnvelope {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<EncryptedEnvelope> for String {
    fn from(envelope: EncryptedEnvelope) -> Self {
        envelope.to_hex()
    }
}

/// Errors from sealing or opening an envelope.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Tampered ciphertext, truncated envelope, unknown version or wrong key.
    #[error("envelope authentication failed")]
    Authentication,

    #[error("envelope encryption failed")]
    Encryption,

    /// Authenticated plaintext that does not decode as a payload.
    #[error(transparent)]
    MalformedPayload(#[from] TypeError),
}

/// ChaCha20-Poly1305 cipher bound to the deployment's envelope key.
pub struct EnvelopeCipher {
    aead: ChaCha20Poly1305,
}

impl EnvelopeCipher {
    /// Cipher bound to `key`.
    pub fn new(key: &EnvelopeKey) -> Self {
        Self {
            aead: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt the canonical encoding of `payload` under a fresh random nonce.
    pub fn seal(&self, payload: &CanonicalPayload) -> Result<EncryptedEnvelope, EnvelopeError> {
        let plaintext = CanonicalHasher::canonical_bytes(payload);

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .aead
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &[ENVELOPE_VERSION],
                },
            )
            .map_err(|_| EnvelopeError::Encryption)?;

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.push(ENVELOPE_VERSION);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(EncryptedEnvelope(out))
    }

    /// Authenticate and decrypt an envelope back into its payload.
    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<CanonicalPayload, EnvelopeError> {
        let bytes = envelope.as_bytes();
        if bytes.len() < HEADER_LEN + TAG_LEN || bytes[0] != ENVELOPE_VERSION {
            return Err(EnvelopeError::Authentication);
        }
        let (nonce, ciphertext) = bytes[1..].split_at(NONCE_LEN);

        let plaintext = self
            .aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &bytes[..1],
                },
            )
            .map_err(|_| EnvelopeError::Authentication)?;

        Ok(CanonicalPayload::from_json_slice(&plaintext)?)
    }
}

impl fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvelopeCipher(ChaCha20Poly1305)")
    }
}

/// Seal `payload` under `key`.
pub fn seal(payload: &CanonicalPayload, key: &EnvelopeKey) -> Result<EncryptedEnvelope, EnvelopeError> {
    EnvelopeCipher::new(key).seal(payload)
}

/// Open `envelope` under `key`.
pub fn open(envelope: &EncryptedEnvelope, key: &EnvelopeKey) -> Result<CanonicalPayload, EnvelopeError> {
    EnvelopeCipher::new(key).open(envelope)
}
