//! `OpenAI` chat completion API: validated request parameters and wire types
//!
//! Response and chunk types mirror the wire format with every field
//! optional, so a backend that omits or nulls a field never fails decoding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::provider::GenerationParams;
use crate::types::{FunctionCallChoice, FunctionDefinition, Message, Role, ToolChoice, ToolDefinition};
use crate::validate::{FieldReader, ValidationError, Violations};

/// Maximum number of stop sequences the API accepts
pub const MAX_STOP_SEQUENCES: usize = 4;

// -- Request parameters --

/// Validated chat completion request
///
/// Only obtainable through [`ChatParams::from_raw`]. Serializing it yields a
/// payload that validates back to an identical value.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct ChatParams {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub model: String,
    #[validate(length(min = 1, message = "must contain at least one message"))]
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0, message = "must be between 0 and 2"))]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0 and 1"))]
    pub top_p: Option<f64>,
    /// Number of alternatives to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 128, message = "must be between 1 and 128"))]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -2.0, max = 2.0, message = "must be between -2 and 2"))]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -2.0, max = 2.0, message = "must be between -2 and 2"))]
    pub frequency_penalty: Option<f64>,
    /// Token id to bias, in request order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<IndexMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// End-user identifier forwarded for abuse monitoring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Legacy function definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<FunctionDefinition>>,
    /// Legacy function selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallChoice>,
    /// Passed through untouched (`{"type": "json_object"}` and friends)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

/// `stop` accepts a single sequence or a short list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

/// Streaming controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamOptions {
    /// Ask the backend to append a usage-only chunk before `[DONE]`
    #[serde(default)]
    pub include_usage: bool,
}

impl ChatParams {
    /// Validate an untyped payload against the chat completion schema
    ///
    /// Every violated field is reported, not just the first one.
    pub fn from_raw(raw: &Value) -> Result<Self, ValidationError> {
        let mut reader = FieldReader::new(raw)?;
        let mut violations = Violations::default();

        let model = reader.required::<String>("model", &mut violations);
        let slots = reader.required_list::<Message>("messages", &mut violations).unwrap_or_default();
        check_messages(&slots, &mut violations);

        let params = Self {
            model: model.unwrap_or_default(),
            messages: slots.into_iter().collect::<Option<Vec<_>>>().unwrap_or_default(),
            temperature: reader.optional("temperature", &mut violations),
            top_p: reader.optional("top_p", &mut violations),
            n: reader.optional("n", &mut violations),
            max_tokens: reader.optional("max_tokens", &mut violations),
            stop: reader.optional("stop", &mut violations),
            presence_penalty: reader.optional("presence_penalty", &mut violations),
            frequency_penalty: reader.optional("frequency_penalty", &mut violations),
            logit_bias: reader.optional("logit_bias", &mut violations),
            seed: reader.optional("seed", &mut violations),
            user: reader.optional("user", &mut violations),
            tools: reader.optional("tools", &mut violations),
            tool_choice: reader.optional("tool_choice", &mut violations),
            functions: reader.optional("functions", &mut violations),
            function_call: reader.optional("function_call", &mut violations),
            response_format: reader.optional("response_format", &mut violations),
            stream: reader.optional("stream", &mut violations),
            stream_options: reader.optional("stream_options", &mut violations),
        };
        reader.reject_unknown(&mut violations);

        if let Err(errors) = params.validate() {
            violations.extend_from_validator(&errors, "");
        }
        params.check_structure(&mut violations);

        violations.into_result()?;
        Ok(params)
    }

    /// Whether the caller asked for a streamed response
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Rules that depend on more than one field
    fn check_structure(&self, violations: &mut Violations) {
        if let Some(StopSequences::Many(sequences)) = &self.stop
            && sequences.len() > MAX_STOP_SEQUENCES
        {
            violations.push("stop", format!("at most {MAX_STOP_SEQUENCES} sequences are allowed"));
        }

        if let Some(bias) = &self.logit_bias {
            for (token, value) in bias {
                if !(-100.0..=100.0).contains(value) {
                    violations.push(format!("logit_bias.{token}"), "must be between -100 and 100");
                }
            }
        }

        if let Some(tools) = &self.tools {
            for (index, tool) in tools.iter().enumerate() {
                if tool.tool_type != "function" {
                    violations.push(format!("tools[{index}].type"), "only \"function\" tools are supported");
                }
            }
        }
    }
}

/// Role-specific requirements, checked on every message that decoded
fn check_messages(slots: &[Option<Message>], violations: &mut Violations) {
    for (index, message) in slots.iter().enumerate() {
        let Some(message) = message else { continue };
        let path = format!("messages[{index}]");
        match message.role {
            Role::System | Role::User if message.content.is_none() => {
                violations.push(format!("{path}.content"), format!("required for {} messages", message.role.as_str()));
            }
            Role::Tool if message.tool_call_id.is_none() => {
                violations.push(format!("{path}.tool_call_id"), "required for tool messages");
            }
            Role::Function if message.name.is_none() => {
                violations.push(format!("{path}.name"), "required for function messages");
            }
            _ => {}
        }
    }
}

impl GenerationParams for ChatParams {
    fn model(&self) -> &str {
        &self.model
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }
}

// -- Response types --

/// `OpenAI` chat completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiResponse {
    pub id: Option<String>,
    pub model: Option<String>,
    pub choices: Option<Vec<OpenAiChoice>>,
    pub usage: Option<OpenAiUsage>,
}

/// Choice within an `OpenAI` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiChoice {
    pub index: Option<u32>,
    pub message: Option<OpenAiChoiceMessage>,
    pub finish_reason: Option<String>,
}

/// Message within an `OpenAI` response choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiChoiceMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub function_call: Option<OpenAiFunctionCall>,
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
}

/// Tool call within a message or a streaming delta
///
/// Stream deltas carry `index` and fill the other fields piecemeal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiToolCall {
    pub index: Option<u32>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub call_type: Option<String>,
    pub function: Option<OpenAiFunctionCall>,
}

/// Function name and (possibly partial) arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiFunctionCall {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Token usage as reported by the backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// -- Streaming types --

/// `OpenAI` streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiStreamChunk {
    pub id: Option<String>,
    pub model: Option<String>,
    pub choices: Option<Vec<OpenAiStreamChoice>>,
    /// Present on the trailing chunk when `stream_options.include_usage` is set
    pub usage: Option<OpenAiUsage>,
    /// In-band failure sent instead of a regular chunk
    pub error: Option<OpenAiErrorDetail>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiStreamChoice {
    pub index: Option<u32>,
    pub delta: Option<OpenAiStreamDelta>,
    pub finish_reason: Option<String>,
}

/// Delta content within a streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiStreamDelta {
    pub role: Option<String>,
    pub content: Option<String>,
    pub function_call: Option<OpenAiFunctionCall>,
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
}

// -- Error response --

/// `OpenAI` error response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiErrorResponse {
    pub error: Option<OpenAiErrorDetail>,
}

/// `OpenAI` error detail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiErrorDetail {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<Value>,
}

impl OpenAiErrorResponse {
    /// Best human-readable message for an error body, falling back to the raw text
    pub fn message_from_body(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|r| r.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| body.trim().to_owned())
    }
}
