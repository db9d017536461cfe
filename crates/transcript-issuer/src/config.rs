//! Issuer configuration.
//!
//! Read from a TOML file; every section is optional and falls back to the
//! defaults below. The envelope key may live in the file, but the
//! `TRANSCRIPT_ENVELOPE_KEY` environment variable always takes precedence.
//!
//! ```toml
//! [institution]
//! id = "inst123"
//! name = "Cambridge Institute of Technology"
//!
//! [ledger]
//! channel = "educationchannel"
//! contract = "education_contract"
//!
//! [envelope]
//! key = "<64 hex chars>"
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use transcript_crypto::key::ENVELOPE_KEY_VAR;
use transcript_crypto::{EnvelopeKey, KeyError, StaticKeyProvider};
use transcript_types::IssuerId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Top-level issuer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    #[serde(default)]
    pub institution: InstitutionConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub envelope: EnvelopeConfig,
}

/// The institution issuing records; its id is the anchor issuer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionConfig {
    #[serde(default = "default_institution_id")]
    pub id: String,

    #[serde(default = "default_institution_name")]
    pub name: String,
}

impl Default for InstitutionConfig {
    fn default() -> Self {
        Self {
            id: default_institution_id(),
            name: default_institution_name(),
        }
    }
}

/// Labels of the ledger network the anchors go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_contract")]
    pub contract: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            contract: default_contract(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Hex-encoded 32-byte key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl fmt::Debug for EnvelopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.key.is_some() { "[REDACTED]" } else { "none" };
        f.debug_struct("EnvelopeConfig").field("key", &key).finish()
    }
}

fn default_institution_id() -> String {
    "inst123".to_string()
}

fn default_institution_name() -> String {
    "Cambridge Institute of Technology".to_string()
}

fn default_channel() -> String {
    "educationchannel".to_string()
}

fn default_contract() -> String {
    "education_contract".to_string()
}

impl IssuerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Issuer identity stamped on ledger submissions.
    pub fn issuer_id(&self) -> IssuerId {
        IssuerId::new(self.institution.id.clone())
    }

    /// Resolve the envelope key: the environment variable first, then the file.
    ///
    /// A missing key is fatal for an issuer, so this fails rather than
    /// generating one.
    pub fn envelope_key(&self) -> Result<EnvelopeKey, ConfigError> {
        let from_env = std::env::var(ENVELOPE_KEY_VAR).ok();
        self.resolve_key(from_env.as_deref())
    }

    /// Resolve the key once and wrap it in a provider.
    pub fn key_provider(&self) -> Result<StaticKeyProvider, ConfigError> {
        Ok(StaticKeyProvider::new(self.envelope_key()?))
    }

    fn resolve_key(&self, from_env: Option<&str>) -> Result<EnvelopeKey, ConfigError> {
        let raw = from_env
            .filter(|v| !v.trim().is_empty())
            .or(self.envelope.key.as_deref())
            .ok_or_else(|| KeyError::Missing(ENVELOPE_KEY_VAR.to_string()))?;
        Ok(EnvelopeKey::from_hex(raw)?)
    }
}
