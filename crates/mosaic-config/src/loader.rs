use std::path::Path;

use crate::{Config, LlmProviderType, MAX_RETRIES_LIMIT};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one LLM provider must be configured");
        }

        let defaults = &self.llm.defaults;
        if defaults.timeout.is_zero() {
            anyhow::bail!("llm.defaults.timeout must be greater than 0");
        }
        if defaults.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!("llm.defaults.max_retries exceeds maximum of {MAX_RETRIES_LIMIT}");
        }
        if self.health.timeout.is_zero() {
            anyhow::bail!("health.timeout must be greater than 0");
        }

        for (name, provider) in &self.llm.providers {
            match provider.provider_type {
                LlmProviderType::Openai => {
                    if provider.deployment.is_some() || provider.api_version.is_some() {
                        anyhow::bail!("provider '{name}': deployment and api_version only apply to azure_openai");
                    }
                }
                LlmProviderType::AzureOpenai => {
                    if provider.base_url.is_none() {
                        anyhow::bail!("provider '{name}': azure_openai requires base_url");
                    }
                    if provider.deployment.as_deref().is_none_or(str::is_empty) {
                        anyhow::bail!("provider '{name}': azure_openai requires deployment");
                    }
                }
            }
        }

        Ok(())
    }
}
