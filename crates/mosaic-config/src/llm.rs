use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Upper bound accepted for `llm.defaults.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Request budget applied when a caller does not pass its own
    #[serde(default)]
    pub defaults: GenerationDefaults,
    /// Backend configurations keyed by name, in file order
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

/// Default timeout and retry budget for generation calls
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationDefaults {
    /// Per-attempt timeout; for streams it bounds the whole stream
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    /// Additional attempts after the first transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause before the first retry; the n-th retry waits n times as long
    #[serde(default = "default_retry_backoff", deserialize_with = "crate::duration::deserialize")]
    pub retry_backoff: Duration,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_retry_backoff() -> Duration {
    Duration::from_millis(200)
}

/// Configuration for a single backend
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Backend protocol flavour
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override (required for Azure)
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Azure deployment name substituted into the request path
    #[serde(default)]
    pub deployment: Option<String>,
    /// Azure `api-version` query parameter
    #[serde(default)]
    pub api_version: Option<String>,
}

impl LlmProviderConfig {
    /// Azure `api-version`, falling back to the pinned default
    pub fn api_version_or_default(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_AZURE_API_VERSION)
    }
}

/// `api-version` used when an Azure provider does not pin one
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// Supported backend protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
    /// OpenAI chat completions API (or a compatible third party)
    Openai,
    /// Azure-hosted OpenAI deployment
    AzureOpenai,
}
