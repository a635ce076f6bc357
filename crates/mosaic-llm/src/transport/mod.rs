//! Network seam between a provider and its backend
//!
//! A transport performs exactly one backend call per invocation. Timeouts
//! and retries are layered on top by the provider, so implementations stay
//! oblivious to both.

mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use secrecy::SecretString;

pub use self::http::{Endpoint, HttpTransport};
use crate::error::TransportFailure;
use crate::protocol::openai::{ChatParams, OpenAiResponse, OpenAiStreamChunk};

/// Raw chunks of a streamed response, in arrival order
///
/// Dropping the stream releases the underlying connection.
pub type ChunkStream<C> = Pin<Box<dyn Stream<Item = Result<C, TransportFailure>> + Send>>;

/// One call against an OpenAI-compatible chat completions backend
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue a non-streaming request
    async fn complete(&self, params: &ChatParams) -> Result<OpenAiResponse, TransportFailure>;

    /// Open a streaming request
    ///
    /// Resolves once response headers arrive; chunks are read lazily.
    async fn stream(&self, params: &ChatParams) -> Result<ChunkStream<OpenAiStreamChunk>, TransportFailure>;

    /// Cheap authenticated read used for health checks
    async fn list_models(&self, api_key: Option<&SecretString>) -> Result<(), TransportFailure>;
}
