//! Mock chat-completions backend for integration tests
//!
//! Serves the `OpenAI` routes under `/v1` and the Azure deployment routes
//! under `/openai`, with canned blocking and SSE responses.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{StreamExt, stream};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONTENT: &str = "Hello from mock LLM";

/// How the mock answers chat requests
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Requests to fail with 500 before succeeding
    pub fail_count: u32,
    /// Answer every chat request with this non-retryable status
    pub reject_status: Option<u16>,
    /// Completion text, split on spaces when streaming
    pub content: Option<String>,
    /// Drop the connection after this many stream chunks
    pub abort_after: Option<usize>,
    /// Send an `error` object in place of the chunk at this position
    pub error_after: Option<usize>,
    /// Slip an unparseable `data:` line in after the first chunk
    pub garbage_frame: bool,
    /// Leave `usage` out of blocking responses
    pub omit_usage: bool,
    /// Key every request must present; any key is accepted when unset
    pub api_key: Option<String>,
}

/// Request as the mock received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
}

/// Mock backend bound to an ephemeral local port
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    behavior: MockBehavior,
    completion_count: AtomicU32,
    models_requests: AtomicU32,
    fail_remaining: AtomicU32,
    last_request: Mutex<Option<RecordedRequest>>,
}

impl MockLlm {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(MockBehavior::default()).await
    }

    /// Start a mock that fails the first `n` chat requests with 500
    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_with(MockBehavior {
            fail_count: n,
            ..MockBehavior::default()
        })
        .await
    }

    pub async fn start_with(behavior: MockBehavior) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            completion_count: AtomicU32::new(0),
            models_requests: AtomicU32::new(0),
            fail_remaining: AtomicU32::new(behavior.fail_count),
            last_request: Mutex::new(None),
            behavior,
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_openai_chat))
            .route("/v1/models", routing::get(handle_openai_models))
            .route(
                "/openai/deployments/{deployment}/chat/completions",
                routing::post(handle_azure_chat),
            )
            .route("/openai/models", routing::get(handle_azure_models))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for an `openai` provider, including `/v1`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Resource URL for an `azure_openai` provider
    pub fn azure_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Chat requests received, failed ones included
    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// Model listing requests received
    pub fn models_requests(&self) -> u32 {
        self.state.models_requests.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.last_request()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Wire types --

#[derive(Debug, Serialize)]
struct ChatCompletionResponse {
    id: String,
    object: &'static str,
    created: u64,
    model: String,
    choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageBody>,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ResponseMessage,
    finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallBody>>,
}

#[derive(Debug, Serialize)]
struct ToolCallBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    call_type: Option<&'static str>,
    function: FunctionBody,
}

#[derive(Debug, Serialize)]
struct FunctionBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    arguments: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct UsageBody {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

const MOCK_USAGE: UsageBody = UsageBody {
    prompt_tokens: 10,
    completion_tokens: 5,
    total_tokens: 15,
};

#[derive(Debug, Serialize)]
struct StreamChunk {
    id: &'static str,
    object: &'static str,
    created: u64,
    model: String,
    choices: Vec<StreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageBody>,
}

#[derive(Debug, Serialize)]
struct StreamChoice {
    index: u32,
    delta: StreamDelta,
    finish_reason: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
struct StreamDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallBody>>,
}

// -- Handlers --

async fn handle_openai_chat(
    State(state): State<Arc<MockLlmState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/v1/chat/completions".to_owned(), body, &headers, None);
    handle_chat(&state, &headers)
}

async fn handle_azure_chat(
    State(state): State<Arc<MockLlmState>>,
    Path(deployment): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = format!("/openai/deployments/{deployment}/chat/completions");
    state.record(path, body, &headers, query.get("api-version").cloned());
    handle_chat(&state, &headers)
}

async fn handle_openai_models(State(state): State<Arc<MockLlmState>>, headers: HeaderMap) -> Response {
    handle_models(&state, &headers)
}

async fn handle_azure_models(
    State(state): State<Arc<MockLlmState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !query.contains_key("api-version") {
        return error_response(StatusCode::BAD_REQUEST, "missing api-version");
    }
    handle_models(&state, &headers)
}

fn handle_models(state: &MockLlmState, headers: &HeaderMap) -> Response {
    state.models_requests.fetch_add(1, Ordering::Relaxed);

    if !state.authorized(headers) {
        return error_response(StatusCode::UNAUTHORIZED, "Incorrect API key provided");
    }

    Json(serde_json::json!({
        "object": "list",
        "data": [{"id": "mock-model-1", "object": "model", "created": 1_700_000_000, "owned_by": "mock"}]
    }))
    .into_response()
}

fn handle_chat(state: &MockLlmState, headers: &HeaderMap) -> Response {
    state.completion_count.fetch_add(1, Ordering::Relaxed);

    if !state.authorized(headers) {
        return error_response(StatusCode::UNAUTHORIZED, "Incorrect API key provided");
    }

    if state
        .fail_remaining
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
    {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "mock server intentional failure");
    }

    if let Some(status) = state.behavior.reject_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        return error_response(status, "The model `mock-model-1` does not exist");
    }

    let Some(body) = state.last_request().map(|request| request.body) else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "request was not recorded");
    };

    if body.get("stream").and_then(Value::as_bool).unwrap_or(false) {
        return streaming_response(state, &body);
    }

    blocking_response(state, &body)
}

fn blocking_response(state: &MockLlmState, body: &Value) -> Response {
    let (content, tool_calls, finish_reason) = if body.get("tools").is_some() {
        (
            None,
            Some(vec![ToolCallBody {
                index: None,
                id: Some("call_test_123".to_owned()),
                call_type: Some("function"),
                function: FunctionBody {
                    name: Some("get_weather".to_owned()),
                    arguments: r#"{"location":"Paris"}"#.to_owned(),
                },
            }]),
            "tool_calls",
        )
    } else {
        (Some(state.content().to_owned()), None, "stop")
    };

    Json(ChatCompletionResponse {
        id: "chatcmpl-test-123".to_owned(),
        object: "chat.completion",
        created: 1_700_000_000,
        model: model_of(body),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content,
                tool_calls,
            },
            finish_reason,
        }],
        usage: (!state.behavior.omit_usage).then_some(MOCK_USAGE),
    })
    .into_response()
}

/// SSE body: role chunk, one chunk per word, finish chunk, optional usage chunk, `[DONE]`
fn streaming_response(state: &MockLlmState, body: &Value) -> Response {
    let model = model_of(body);
    let chunk = |delta: StreamDelta, finish_reason: Option<&'static str>| StreamChunk {
        id: "chatcmpl-test-stream",
        object: "chat.completion.chunk",
        created: 1_700_000_000,
        model: model.clone(),
        choices: vec![StreamChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage: None,
    };

    let mut chunks = vec![chunk(
        StreamDelta {
            role: Some("assistant"),
            content: Some(String::new()),
            ..StreamDelta::default()
        },
        None,
    )];

    let finish_reason = if body.get("tools").is_some() {
        let fragments = [
            (Some("call_test_123"), Some("get_weather"), ""),
            (None, None, r#"{"location":"#),
            (None, None, r#""Paris"}"#),
        ];
        chunks.extend(fragments.into_iter().map(|(id, name, arguments)| {
            chunk(
                StreamDelta {
                    tool_calls: Some(vec![ToolCallBody {
                        index: Some(0),
                        id: id.map(str::to_owned),
                        call_type: id.map(|_| "function"),
                        function: FunctionBody {
                            name: name.map(str::to_owned),
                            arguments: arguments.to_owned(),
                        },
                    }]),
                    ..StreamDelta::default()
                },
                None,
            )
        }));
        "tool_calls"
    } else {
        let words: Vec<&str> = state.content().split(' ').collect();
        chunks.extend(words.iter().enumerate().map(|(i, word)| {
            let text = if i == 0 { (*word).to_owned() } else { format!(" {word}") };
            chunk(
                StreamDelta {
                    content: Some(text),
                    ..StreamDelta::default()
                },
                None,
            )
        }));
        "stop"
    };
    chunks.push(chunk(StreamDelta::default(), Some(finish_reason)));

    let include_usage = body
        .pointer("/stream_options/include_usage")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if include_usage {
        chunks.push(StreamChunk {
            choices: Vec::new(),
            usage: Some(MOCK_USAGE),
            ..chunk(StreamDelta::default(), None)
        });
    }

    let mut frames: Vec<Result<String, std::io::Error>> = chunks
        .iter()
        .map(|chunk| Ok(format!("data: {}\n\n", serde_json::to_string(chunk).unwrap_or_default())))
        .collect();

    if state.behavior.garbage_frame {
        frames.insert(1.min(frames.len()), Ok("data: {\"choices\": [\n\n".to_owned()));
    }

    if let Some(limit) = state.behavior.error_after {
        frames.truncate(limit);
        let error = serde_json::json!({
            "error": {"message": "The server had an error while processing your request.", "type": "server_error"}
        });
        frames.push(Ok(format!("data: {error}\n\n")));
    }

    if let Some(limit) = state.behavior.abort_after {
        frames.truncate(limit);
        frames.push(Err(std::io::Error::other("mock connection reset")));
    } else {
        frames.push(Ok("data: [DONE]\n\n".to_owned()));
    }

    // Let delivered frames reach the socket before the connection drops
    let frames = stream::iter(frames).then(|frame| async move {
        if frame.is_err() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        frame
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to build stream"))
}

impl MockLlmState {
    fn record(&self, path: String, body: Value, headers: &HeaderMap, api_version: Option<String>) {
        let header_value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
        let request = RecordedRequest {
            path,
            body,
            authorization: header_value("authorization"),
            api_key: header_value("api-key"),
            api_version,
        };
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = Some(request);
        }
    }

    fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.behavior.api_key else {
            return true;
        };

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let azure = headers.get("api-key").and_then(|v| v.to_str().ok());

        bearer.or(azure) == Some(expected.as_str())
    }

    fn content(&self) -> &str {
        self.behavior.content.as_deref().unwrap_or(DEFAULT_CONTENT)
    }
}

fn model_of(body: &Value) -> String {
    body.get("model").and_then(Value::as_str).unwrap_or("mock-model-1").to_owned()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": {
                "message": message,
                "type": "mock_error"
            }
        })),
    )
        .into_response()
}
