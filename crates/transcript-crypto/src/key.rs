//! Envelope key material and the providers that load it at process start.
//!
//! A deployment uses exactly one 256-bit symmetric key. It is loaded once,
//! never mutated, and zeroized when dropped. A missing or malformed key is a
//! configuration error surfaced at startup, not a per-call failure.

use std::fmt;

use rand::RngCore;
use zeroize::Zeroize;

/// Environment variable read by [`EnvKeyProvider::from_default_env`].
pub const ENVELOPE_KEY_VAR: &str = "TRANSCRIPT_ENVELOPE_KEY";

/// Length of an envelope key in bytes.
pub const KEY_LEN: usize = 32;

/// 256-bit symmetric key for the payload envelope.
#[derive(Clone)]
pub struct EnvelopeKey([u8; KEY_LEN]);

impl EnvelopeKey {
    /// Generate a new random key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let mut decoded = hex::decode(s.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        if decoded.len() != KEY_LEN {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(KeyError::InvalidLength {
                expected: KEY_LEN,
                actual,
            });
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    /// Lowercase hex; treat the result as secret.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for EnvelopeKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvelopeKey(<redacted>)")
    }
}

/// Errors from loading key material.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("envelope key is not configured: set {0} to a 64-character hex key")]
    Missing(String),

    #[error("invalid envelope key hex: {0}")]
    InvalidHex(String),

    #[error("invalid envelope key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Source of the process-wide envelope key.
pub trait KeyProvider: Send + Sync {
    /// The envelope key. Implementations load once and hand out copies.
    fn envelope_key(&self) -> Result<EnvelopeKey, KeyError>;

    /// Human-readable name for diagnostics. Never includes key material.
    fn provider_name(&self) -> &str;
}

/// Key held directly in memory, for tests and embedding.
pub struct StaticKeyProvider {
    key: EnvelopeKey,
}

impl StaticKeyProvider {
    /// Provider that always hands out `key`.
    pub fn new(key: EnvelopeKey) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn envelope_key(&self) -> Result<EnvelopeKey, KeyError> {
        Ok(self.key.clone())
    }

    fn provider_name(&self) -> &str {
        "StaticKeyProvider"
    }
}

/// Loads a hex-encoded key from an environment variable at construction.
///
/// ```bash
/// export TRANSCRIPT_ENVELOPE_KEY="$(transcript keygen)"
/// ```
pub struct EnvKeyProvider {
    key: EnvelopeKey,
    var_name: String,
}

impl EnvKeyProvider {
    /// Read and parse the key from `var_name` now.
    pub fn from_env(var_name: &str) -> Result<Self, KeyError> {
        let raw = std::env::var(var_name).map_err(|_| KeyError::Missing(var_name.to_string()))?;
        if raw.trim().is_empty() {
            return Err(KeyError::Missing(var_name.to_string()));
        }
        let key = EnvelopeKey::from_hex(&raw)?;
        Ok(Self {
            key,
            var_name: var_name.to_string(),
        })
    }

    /// Read the key from `TRANSCRIPT_ENVELOPE_KEY`.
    pub fn from_default_env() -> Result<Self, KeyError> {
        Self::from_env(ENVELOPE_KEY_VAR)
    }

    /// Variable the key was read from.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl KeyProvider for EnvKeyProvider {
    fn envelope_key(&self) -> Result<EnvelopeKey, KeyError> {
        Ok(self.key.clone())
    }

    fn provider_name(&self) -> &str {
        "EnvKeyProvider"
    }
}
