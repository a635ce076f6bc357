use serde::{Deserialize, Serialize};

use super::message::{FunctionCall, Role, ToolCall};

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation or a stop sequence
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Model decided to call a legacy function
    FunctionCall,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Parse a backend-reported reason; unknown values map to `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stop" => Some(Self::Stop),
            "length" => Some(Self::Length),
            "tool_calls" => Some(Self::ToolCalls),
            "function_call" => Some(Self::FunctionCall),
            "content_filter" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Always `prompt_tokens + completion_tokens` for locally computed usage
    pub total_tokens: u32,
    /// Counts come from a fallback encoding or a character estimate
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approximate: bool,
}

impl Usage {
    /// Exact usage from prompt and completion counts
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            approximate: false,
        }
    }

    /// Mark the counts as estimated
    #[must_use]
    pub const fn approximated(mut self) -> Self {
        self.approximate = true;
        self
    }
}

/// A single generated alternative
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Generated text, empty when the backend sent none
    pub text: String,
    /// Position among the alternatives, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Role of the generated message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Legacy function call requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Canonical output of a non-streaming generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Backend response identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Generated alternatives in backend order
    pub choices: Vec<Choice>,
    /// Model that served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Token accounting for the whole request
    pub usage: Usage,
}
