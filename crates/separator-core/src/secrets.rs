//! Secret store clients
//!
//! The credential chain only needs `get_secret(name)`. [`KeyVaultClient`]
//! talks to a vault over HTTP; [`StaticSecretStore`] serves an in-process map.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Secret Store Constants
// ============================================================================

/// Vault REST API version sent with every request
pub const KEY_VAULT_API_VERSION: &str = "7.4";

/// Timeout for a single secret lookup in seconds
pub const DEFAULT_SECRET_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Secret store unavailable while reading '{name}': {message}")]
    Unavailable { name: String, message: String },

    #[error("Invalid secret name '{0}'")]
    InvalidName(String),
}

/// Read access to named secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

/// HTTP client for a Key Vault compatible secret store
pub struct KeyVaultClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

impl KeyVaultClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, SecretError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_SECRET_TIMEOUT_SECS))
            .build()
            .map_err(|e| SecretError::Unavailable {
                name: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/secrets/{}", self.base_url, name)
    }
}

impl std::fmt::Debug for KeyVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn validate_name(name: &str) -> Result<(), SecretError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(SecretError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    #[tracing::instrument(skip(self))]
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        validate_name(name)?;

        let unavailable = |message: String| SecretError::Unavailable {
            name: name.to_string(),
            message,
        };

        let mut request = self
            .client
            .get(self.secret_url(name))
            .query(&[("api-version", KEY_VAULT_API_VERSION)]);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SecretError::NotFound(name.to_string())),
            status if status.is_success() => {
                let bundle: SecretBundle =
                    response.json().await.map_err(|e| unavailable(e.to_string()))?;
                tracing::debug!("Secret retrieved");
                Ok(bundle.value)
            },
            status => Err(unavailable(format!("HTTP {}", status))),
        }
    }
}

/// Secrets held in memory
#[derive(Default, Clone)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretStore")
            .field("names", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}
