//! Normalization of `OpenAI` wire responses into canonical types
//!
//! Every accessor on the wire side is optional; absent data becomes an empty
//! string or `None`, never an error.

use super::{NormalizedChunk, NormalizedResponse};
use crate::protocol::openai::{
    OpenAiChoice, OpenAiFunctionCall, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamChoice, OpenAiToolCall,
    OpenAiUsage,
};
use crate::types::{
    Choice, FinishReason, FunctionCall, Role, StreamFunctionCall, StreamToolCall, StreamUpdate, ToolCall, Usage,
};

/// Map a whole chat completion response
pub fn normalize_response(response: OpenAiResponse) -> NormalizedResponse {
    NormalizedResponse {
        id: response.id,
        choices: response
            .choices
            .unwrap_or_default()
            .into_iter()
            .map(normalize_choice)
            .collect(),
        model: response.model,
        usage: response.usage.and_then(reported_usage),
    }
}

fn normalize_choice(choice: OpenAiChoice) -> Choice {
    let message = choice.message.unwrap_or_default();

    Choice {
        text: message.content.unwrap_or_default(),
        index: choice.index,
        finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::parse),
        role: message.role.as_deref().and_then(parse_role),
        function_call: message.function_call.map(complete_function_call),
        tool_calls: message
            .tool_calls
            .map(|calls| calls.into_iter().map(complete_tool_call).collect()),
    }
}

/// Map one streamed chunk
///
/// Only the first choice is surfaced. A chunk without choices (such as the
/// trailing usage chunk) yields no update.
pub fn normalize_chunk(chunk: OpenAiStreamChunk) -> NormalizedChunk {
    if let Some(error) = chunk.error {
        let message = error
            .message
            .or(error.error_type)
            .unwrap_or_else(|| "unspecified stream error".to_owned());
        return NormalizedChunk {
            error: Some(message),
            ..NormalizedChunk::default()
        };
    }

    let usage = chunk.usage.and_then(reported_usage);
    let update = chunk
        .choices
        .and_then(|choices| choices.into_iter().next())
        .map(|choice| normalize_stream_choice(chunk.id, choice));

    NormalizedChunk {
        update,
        usage,
        error: None,
    }
}

fn normalize_stream_choice(id: Option<String>, choice: OpenAiStreamChoice) -> StreamUpdate {
    let delta = choice.delta.unwrap_or_default();

    StreamUpdate {
        id,
        text: delta.content.unwrap_or_default(),
        finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::parse),
        tool_calls: delta
            .tool_calls
            .map(|calls| calls.into_iter().map(partial_tool_call).collect()),
        function_call: delta.function_call.map(partial_function_call),
    }
}

/// Backend counts, usable only when both halves were reported
fn reported_usage(usage: OpenAiUsage) -> Option<Usage> {
    let (Some(prompt), Some(completion)) = (usage.prompt_tokens, usage.completion_tokens) else {
        return None;
    };

    Some(Usage {
        total_tokens: usage.total_tokens.unwrap_or_else(|| prompt.saturating_add(completion)),
        ..Usage::new(prompt, completion)
    })
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw {
        "system" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        "tool" => Some(Role::Tool),
        "function" => Some(Role::Function),
        _ => None,
    }
}

fn complete_function_call(call: OpenAiFunctionCall) -> FunctionCall {
    FunctionCall {
        name: call.name.unwrap_or_default(),
        arguments: call.arguments.unwrap_or_default(),
    }
}

fn complete_tool_call(call: OpenAiToolCall) -> ToolCall {
    ToolCall {
        id: call.id.unwrap_or_default(),
        call_type: call.call_type.unwrap_or_else(|| "function".to_owned()),
        function: complete_function_call(call.function.unwrap_or_default()),
    }
}

fn partial_function_call(call: OpenAiFunctionCall) -> StreamFunctionCall {
    StreamFunctionCall {
        name: call.name,
        arguments: call.arguments,
    }
}

fn partial_tool_call(call: OpenAiToolCall) -> StreamToolCall {
    StreamToolCall {
        index: call.index,
        id: call.id,
        function: call.function.map(partial_function_call),
    }
}
