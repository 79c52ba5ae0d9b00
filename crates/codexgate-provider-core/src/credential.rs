use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    #[serde(rename = "oauth")]
    OAuth,
    #[serde(rename = "api_key", alias = "apiKey", alias = "api")]
    ApiKey,
    #[serde(rename = "none")]
    None,
}

/// Token triple for the ChatGPT backend.
///
/// Values are immutable once built; a refresh produces a new `Credential`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub refresh: String,
    /// Unix milliseconds.
    #[serde(default, alias = "expires", alias = "expiresAt")]
    pub expires_at: i64,
}

impl Credential {
    pub fn oauth(access: impl Into<String>, refresh: impl Into<String>, expires_at: i64) -> Self {
        Self {
            kind: CredentialKind::OAuth,
            access: access.into(),
            refresh: refresh.into(),
            expires_at,
        }
    }

    /// Usable means OAuth, a non-empty access token and `expires_at` strictly after `now_ms`.
    pub fn is_usable(&self, now_ms: i64) -> bool {
        self.kind == CredentialKind::OAuth && !self.access.is_empty() && self.expires_at > now_ms
    }
}

/// Host-provided persistence for the current credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Credential, ProviderError>;
    async fn set(&self, credential: Credential) -> Result<(), ProviderError>;
}
