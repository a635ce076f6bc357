//! Backend reachability checks
//!
//! A health check is one cheap authenticated read against the backend. It answers
//! a boolean and nothing else: failures are logged, never raised.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mosaic_config::LlmConfig;
use secrecy::SecretString;

use crate::transport::ChatTransport;

/// Source of backend credentials
///
/// Implementations may consult configuration, a secrets manager or a
/// database; health checks only ever see the resolved key.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// API key for the named provider, if one is configured
    async fn api_key(&self, provider: &str) -> anyhow::Result<Option<SecretString>>;
}

/// Credentials fixed at startup
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, SecretString>,
}

impl StaticCredentials {
    /// Collect the API key of every configured provider
    pub fn from_config(config: &LlmConfig) -> Self {
        let keys = config
            .providers
            .iter()
            .filter_map(|(name, provider)| provider.api_key.clone().map(|key| (name.clone(), key)))
            .collect();

        Self { keys }
    }

    #[must_use]
    pub fn with_key(mut self, provider: impl Into<String>, key: SecretString) -> Self {
        self.keys.insert(provider.into(), key);
        self
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn api_key(&self, provider: &str) -> anyhow::Result<Option<SecretString>> {
        Ok(self.keys.get(provider).cloned())
    }
}

/// Check a backend within `timeout`
///
/// Returns `false` on credential lookup failure, network error, timeout or
/// any non-success status.
pub async fn check(
    provider: &str,
    transport: &dyn ChatTransport,
    credentials: &dyn CredentialStore,
    timeout: Duration,
) -> bool {
    let api_key = match credentials.api_key(provider).await {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(provider, error = %e, "credential lookup failed during health check");
            return false;
        }
    };

    match tokio::time::timeout(timeout, transport.list_models(api_key.as_ref())).await {
        Ok(Ok(())) => true,
        Ok(Err(failure)) => {
            tracing::debug!(provider, error = %failure, "health check failed");
            false
        }
        Err(_) => {
            tracing::debug!(provider, timeout = ?timeout, "health check timed out");
            false
        }
    }
}
