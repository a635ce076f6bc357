//! Provider trait and backend bindings
//!
//! A provider supplies the backend-specific pieces (validation, transport,
//! normalization, usage counting, health checks). The generation entry
//! points are provided methods, so every backend gets the same retry,
//! timeout and streaming semantics.

pub mod openai;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde_json::Value;

use crate::convert::{NormalizedChunk, NormalizedResponse};
use crate::error::{LlmError, TransportFailure};
use crate::health::CredentialStore;
use crate::retry::{DEFAULT_RETRY_BACKOFF, with_retry};
use crate::transport::ChunkStream;
use crate::types::{GenerationResult, Message, StreamAbort, StreamEvent, StreamMeta, Usage};
use crate::validate::ValidationError;

/// Lazily produced events of one streamed generation
///
/// Dropping it cancels the backend call.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// What the orchestrator needs to know about validated parameters
pub trait GenerationParams: Send + Sync + 'static {
    /// Model requested by the caller
    fn model(&self) -> &str;

    /// Prompt messages, in order
    fn messages(&self) -> &[Message];
}

/// Trait implemented by each backend binding
#[async_trait]
pub trait Provider: Clone + Send + Sync + 'static {
    /// Validated, backend-specific parameters
    type Params: GenerationParams;
    /// Backend-native whole response
    type Response: Send;
    /// Backend-native stream chunk
    type Chunk: Send + 'static;

    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Validate an untyped payload; must not touch the network
    fn validate_params(&self, raw: &Value) -> Result<Self::Params, ValidationError>;

    /// One non-streaming backend call
    async fn send(&self, params: &Self::Params) -> Result<Self::Response, TransportFailure>;

    /// Open one streaming backend call
    async fn open_stream(&self, params: &Self::Params) -> Result<ChunkStream<Self::Chunk>, TransportFailure>;

    /// Map a whole response to canonical shapes
    fn normalize_response(&self, response: Self::Response) -> NormalizedResponse;

    /// Map one chunk to canonical shapes
    fn normalize_chunk(&self, chunk: Self::Chunk) -> NormalizedChunk;

    /// Usage computed locally from the prompt and a completion text
    fn token_usage(&self, params: &Self::Params, completion: &str) -> Usage;

    /// Whether the backend is reachable with the stored credentials
    async fn health_check(&self, credentials: &dyn CredentialStore) -> bool;

    /// Base pause between retries
    fn retry_backoff(&self) -> Duration {
        DEFAULT_RETRY_BACKOFF
    }

    /// Generate a complete response
    ///
    /// Validates, calls the backend with up to `max_retries` retries of
    /// `timeout` each, normalizes and attaches usage. Backend-reported usage
    /// wins; otherwise it is counted locally.
    async fn generate(&self, raw: &Value, timeout: Duration, max_retries: u32) -> Result<GenerationResult, LlmError> {
        let params = self.validate_params(raw)?;

        let response = {
            let params = &params;
            with_retry(self.name(), timeout, max_retries, self.retry_backoff(), move |_| self.send(params)).await?
        };

        let normalized = self.normalize_response(response);
        let usage = match normalized.usage {
            Some(usage) => usage,
            None => self.token_usage(&params, &normalized.completion_text()),
        };

        Ok(GenerationResult {
            id: normalized.id,
            choices: normalized.choices,
            model: normalized.model,
            usage,
        })
    }

    /// Generate a response as a lazy sequence of events
    ///
    /// The call resolves only once the backend delivered its first chunk (or
    /// closed an empty stream); failures up to that point are retried and
    /// surface as `Err`. `timeout` then bounds the whole stream, measured
    /// from the start of the successful attempt. Later failures end the
    /// sequence with a [`StreamEvent::Error`], never with a retry.
    async fn stream_generate(&self, raw: &Value, timeout: Duration, max_retries: u32) -> Result<EventStream, LlmError> {
        let params = self.validate_params(raw)?;

        let (started, mut chunks, first) = {
            let this = self;
            let params = &params;
            with_retry(self.name(), timeout, max_retries, self.retry_backoff(), move |_| async move {
                let started = tokio::time::Instant::now();
                let mut chunks = this.open_stream(params).await?;
                let first = chunks.next().await.transpose()?.map(|chunk| this.normalize_chunk(chunk));
                if let Some(NormalizedChunk { error: Some(message), .. }) = &first {
                    return Err(TransportFailure::Backend(message.clone()));
                }
                Ok((started, chunks, first))
            })
            .await?
        };

        let provider = self.clone();
        let deadline = started + timeout;

        Ok(Box::pin(async_stream::stream! {
            let mut pending = first;
            let mut text = String::new();
            let mut reported = None;
            let mut delivered = 0;

            loop {
                let normalized = match pending.take() {
                    Some(normalized) => normalized,
                    None => match tokio::time::timeout_at(deadline, chunks.next()).await {
                        Ok(Some(Ok(chunk))) => provider.normalize_chunk(chunk),
                        Ok(None) => break,
                        Ok(Some(Err(failure))) => {
                            tracing::warn!(provider = provider.name(), delivered, error = %failure, "stream aborted");
                            yield StreamEvent::Error(StreamAbort { message: failure.to_string(), delivered });
                            return;
                        }
                        Err(_) => {
                            tracing::warn!(provider = provider.name(), delivered, timeout = ?timeout, "stream timed out");
                            yield StreamEvent::Error(StreamAbort {
                                message: TransportFailure::Timeout(timeout).to_string(),
                                delivered,
                            });
                            return;
                        }
                    },
                };

                if let Some(message) = normalized.error {
                    tracing::warn!(provider = provider.name(), delivered, error = %message, "backend reported an error mid-stream");
                    yield StreamEvent::Error(StreamAbort {
                        message: TransportFailure::Backend(message).to_string(),
                        delivered,
                    });
                    return;
                }
                if normalized.usage.is_some() {
                    reported = normalized.usage;
                }
                if let Some(update) = normalized.update {
                    text.push_str(&update.text);
                    delivered += 1;
                    yield StreamEvent::Update(update);
                }
            }

            let usage = reported.unwrap_or_else(|| provider.token_usage(&params, &text));
            tracing::debug!(provider = provider.name(), delivered, total_tokens = usage.total_tokens, "stream completed");
            yield StreamEvent::Meta(StreamMeta {
                text,
                model: params.model().to_owned(),
                usage,
            });
        }))
    }
}
