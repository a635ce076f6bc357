//! Configured providers, looked up by name

use std::sync::Arc;

use futures_util::future::join_all;
use indexmap::IndexMap;
use mosaic_config::{Config, GenerationDefaults};

use crate::health::{CredentialStore, StaticCredentials};
use crate::provider::Provider;
use crate::provider::openai::OpenAiProvider;

/// Every configured backend plus the request defaults
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: IndexMap<String, OpenAiProvider>,
    defaults: GenerationDefaults,
    credentials: Arc<dyn CredentialStore>,
}

impl ProviderRegistry {
    /// Build one provider per configured entry, in file order
    ///
    /// Health checks read credentials from the configuration itself.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first provider that cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let credentials = Arc::new(StaticCredentials::from_config(&config.llm));
        Self::with_credentials(config, credentials)
    }

    /// Like [`Self::from_config`], with credentials for health checks supplied by the caller
    ///
    /// # Errors
    ///
    /// Returns an error naming the first provider that cannot be built.
    pub fn with_credentials(config: &Config, credentials: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let defaults = config.llm.defaults.clone();
        let mut providers = IndexMap::with_capacity(config.llm.providers.len());

        for (name, provider_config) in &config.llm.providers {
            let provider = OpenAiProvider::new(name.as_str(), provider_config)
                .map_err(|e| anyhow::anyhow!("failed to initialize provider '{name}': {e}"))?
                .with_health_timeout(config.health.timeout)
                .with_retry_backoff(defaults.retry_backoff);

            tracing::debug!(provider = %name, kind = ?provider_config.provider_type, "provider registered");
            providers.insert(name.clone(), provider);
        }

        Ok(Self {
            providers,
            defaults,
            credentials,
        })
    }

    /// Provider registered under `name`
    pub fn get(&self, name: &str) -> Option<&OpenAiProvider> {
        self.providers.get(name)
    }

    /// Provider names in configuration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Timeout and retry budget for callers that do not bring their own
    pub const fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    /// Check every provider concurrently
    pub async fn health_report(&self) -> IndexMap<String, bool> {
        let checks = self.providers.iter().map(|(name, provider)| async move {
            let healthy = provider.health_check(self.credentials.as_ref()).await;
            if !healthy {
                tracing::warn!(provider = %name, "provider failed health check");
            }
            (name.clone(), healthy)
        });

        join_all(checks).await.into_iter().collect()
    }
}
