//! `OpenAI` chat completions binding, also used for Azure `OpenAI` deployments

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mosaic_config::LlmProviderConfig;
use serde_json::Value;

use super::{GenerationParams, Provider};
use crate::convert::{self, NormalizedChunk, NormalizedResponse};
use crate::error::TransportFailure;
use crate::health::{self, CredentialStore};
use crate::protocol::openai::{ChatParams, OpenAiResponse, OpenAiStreamChunk};
use crate::retry::DEFAULT_RETRY_BACKOFF;
use crate::transport::{ChatTransport, ChunkStream, Endpoint, HttpTransport};
use crate::types::Usage;
use crate::usage::{self, TiktokenCounter, TokenCounter};
use crate::validate::ValidationError;

/// Health check budget used unless configured otherwise
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// OpenAI-compatible provider
///
/// Cheap to clone; clones share the connection pool and tokenizer tables.
#[derive(Clone)]
pub struct OpenAiProvider {
    name: Arc<str>,
    transport: Arc<dyn ChatTransport>,
    tokens: Arc<dyn TokenCounter>,
    health_timeout: Duration,
    retry_backoff: Duration,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not describe a usable endpoint.
    pub fn new(name: impl Into<Arc<str>>, config: &LlmProviderConfig) -> anyhow::Result<Self> {
        let endpoint = Endpoint::from_config(config)?;
        let transport = HttpTransport::new(endpoint, config.api_key.clone());

        Ok(Self::with_transport(name, Arc::new(transport)))
    }

    /// Create on top of an arbitrary transport
    pub fn with_transport(name: impl Into<Arc<str>>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
            tokens: Arc::new(TiktokenCounter),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_token_counter(mut self, tokens: Arc<dyn TokenCounter>) -> Self {
        self.tokens = tokens;
        self
    }

    #[must_use]
    pub const fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    type Params = ChatParams;
    type Response = OpenAiResponse;
    type Chunk = OpenAiStreamChunk;

    fn name(&self) -> &str {
        &self.name
    }

    fn validate_params(&self, raw: &Value) -> Result<ChatParams, ValidationError> {
        ChatParams::from_raw(raw)
    }

    async fn send(&self, params: &ChatParams) -> Result<OpenAiResponse, TransportFailure> {
        self.transport.complete(params).await
    }

    async fn open_stream(&self, params: &ChatParams) -> Result<ChunkStream<OpenAiStreamChunk>, TransportFailure> {
        self.transport.stream(params).await
    }

    fn normalize_response(&self, response: OpenAiResponse) -> NormalizedResponse {
        convert::openai::normalize_response(response)
    }

    fn normalize_chunk(&self, chunk: OpenAiStreamChunk) -> NormalizedChunk {
        convert::openai::normalize_chunk(chunk)
    }

    fn token_usage(&self, params: &ChatParams, completion: &str) -> Usage {
        usage::usage(self.tokens.as_ref(), params.messages(), completion, params.model())
    }

    async fn health_check(&self, credentials: &dyn CredentialStore) -> bool {
        health::check(&self.name, self.transport.as_ref(), credentials, self.health_timeout).await
    }

    fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }
}
