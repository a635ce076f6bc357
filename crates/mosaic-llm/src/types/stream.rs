use serde::{Deserialize, Serialize};

use super::response::{FinishReason, Usage};

/// Element of a streamed generation
///
/// A well-formed sequence is zero or more `Update`s followed by exactly one
/// terminal `Meta` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Incremental output, in backend arrival order
    Update(StreamUpdate),
    /// Stream finished normally
    Meta(StreamMeta),
    /// Stream aborted after partial delivery
    Error(StreamAbort),
}

impl StreamEvent {
    /// Whether this event ends the sequence
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Meta(_) | Self::Error(_))
    }
}

/// Incremental output carried by one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUpdate {
    /// Backend response identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Text delta, empty when the chunk carried none
    pub text: String,
    /// Present on the chunk that ends a choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Partial tool call data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamToolCall>>,
    /// Partial legacy function call data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<StreamFunctionCall>,
}

/// Terminal summary of a completed stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMeta {
    /// Concatenation of every update's text, in delivery order
    pub text: String,
    /// Model requested by the caller
    pub model: String,
    pub usage: Usage,
}

/// Terminal marker of an aborted stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAbort {
    /// Cause of the abort
    pub message: String,
    /// Updates delivered before the abort
    pub delivered: usize,
}

/// Partial tool call data within a stream update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamToolCall {
    /// Index of this tool call in the `tool_calls` array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Tool call ID (first chunk only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<StreamFunctionCall>,
}

/// Partial function call data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name (first chunk only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Incremental arguments JSON fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
