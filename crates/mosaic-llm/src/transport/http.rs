//! reqwest-backed transport for `OpenAI` and Azure `OpenAI`

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, future};
use mosaic_config::{LlmProviderConfig, LlmProviderType};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChatTransport, ChunkStream};
use crate::error::TransportFailure;
use crate::protocol::openai::{ChatParams, OpenAiErrorResponse, OpenAiResponse, OpenAiStreamChunk, StreamOptions};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Where requests are sent and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `OpenAI` or a compatible third party, bearer auth
    OpenAi { base_url: Url },
    /// Azure deployment, `api-key` header auth
    Azure {
        base_url: Url,
        deployment: String,
        api_version: String,
    },
}

impl Endpoint {
    /// Resolve the endpoint described by a provider entry
    pub fn from_config(config: &LlmProviderConfig) -> anyhow::Result<Self> {
        match config.provider_type {
            LlmProviderType::Openai => {
                let base_url = match &config.base_url {
                    Some(url) => url.clone(),
                    None => Url::parse(DEFAULT_BASE_URL)?,
                };
                Ok(Self::OpenAi { base_url })
            }
            LlmProviderType::AzureOpenai => {
                let (Some(base_url), Some(deployment)) = (&config.base_url, &config.deployment) else {
                    anyhow::bail!("azure_openai providers require base_url and deployment");
                };
                Ok(Self::Azure {
                    base_url: base_url.clone(),
                    deployment: deployment.clone(),
                    api_version: config.api_version_or_default().to_owned(),
                })
            }
        }
    }

    fn base(&self) -> &str {
        match self {
            Self::OpenAi { base_url } | Self::Azure { base_url, .. } => base_url.as_str().trim_end_matches('/'),
        }
    }

    /// Chat completions URL
    pub fn completions_url(&self) -> String {
        let base = self.base();
        match self {
            Self::OpenAi { .. } => format!("{base}/chat/completions"),
            Self::Azure {
                deployment,
                api_version,
                ..
            } => format!("{base}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"),
        }
    }

    /// Model listing URL used by health checks
    pub fn models_url(&self) -> String {
        let base = self.base();
        match self {
            Self::OpenAi { .. } => format!("{base}/models"),
            Self::Azure { api_version, .. } => format!("{base}/openai/models?api-version={api_version}"),
        }
    }

    /// Whether this is the canonical `OpenAI` API (vs a compatible third party)
    pub fn is_canonical_openai(&self) -> bool {
        match self {
            Self::OpenAi { base_url } => base_url.host_str() == Some("api.openai.com"),
            Self::Azure { .. } => false,
        }
    }

    fn authorize(&self, builder: RequestBuilder, api_key: Option<&SecretString>) -> RequestBuilder {
        match (self, api_key) {
            (_, None) => builder,
            (Self::OpenAi { .. }, Some(key)) => builder.bearer_auth(key.expose_secret()),
            (Self::Azure { .. }, Some(key)) => builder.header("api-key", key.expose_secret()),
        }
    }
}

/// HTTP transport holding one connection pool per provider
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Endpoint,
    api_key: Option<SecretString>,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
        }
    }

    /// Request body with the streaming flag forced to match the call
    ///
    /// Only canonical `OpenAI` is asked for trailing usage; many compatible
    /// APIs reject the unsupported parameter.
    fn body(&self, params: &ChatParams, stream: bool) -> ChatParams {
        let mut body = params.clone();
        body.stream = stream.then_some(true);
        body.stream_options = match (stream, body.stream_options) {
            (false, _) => None,
            (true, Some(options)) => Some(options),
            (true, None) => self
                .endpoint
                .is_canonical_openai()
                .then_some(StreamOptions { include_usage: true }),
        };
        body
    }

    async fn post(&self, params: &ChatParams, stream: bool) -> Result<Response, TransportFailure> {
        let builder = self
            .client
            .post(self.endpoint.completions_url())
            .json(&self.body(params, stream));

        let response = self
            .endpoint
            .authorize(builder, self.api_key.as_ref())
            .send()
            .await
            .map_err(|e| TransportFailure::Network(e.to_string()))?;

        ensure_success(response).await
    }
}

/// Turn a non-success response into a `Status` failure carrying the backend message
async fn ensure_success(response: Response) -> Result<Response, TransportFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = OpenAiErrorResponse::message_from_body(&body);
    tracing::debug!(status = %status, message = %message, "backend returned error status");

    Err(TransportFailure::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, params: &ChatParams) -> Result<OpenAiResponse, TransportFailure> {
        let response = self.post(params, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::Network(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| TransportFailure::Decode(e.to_string()))
    }

    async fn stream(&self, params: &ChatParams) -> Result<ChunkStream<OpenAiStreamChunk>, TransportFailure> {
        let response = self.post(params, true).await?;

        let chunks = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| future::ready(!matches!(event, Ok(event) if event.data.trim() == "[DONE]")))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => match serde_json::from_str::<OpenAiStreamChunk>(event.data.trim()) {
                        Ok(chunk) => Some(Ok(chunk)),
                        Err(e) => {
                            tracing::warn!(error = %e, data = %event.data, "skipping unparseable SSE chunk");
                            None
                        }
                    },
                    Err(e) => Some(Err(TransportFailure::Network(e.to_string()))),
                })
            });

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self, api_key: Option<&SecretString>) -> Result<(), TransportFailure> {
        let builder = self.client.get(self.endpoint.models_url());
        let response = self
            .endpoint
            .authorize(builder, api_key)
            .send()
            .await
            .map_err(|e| TransportFailure::Network(e.to_string()))?;

        ensure_success(response).await.map(drop)
    }
}
