//! Canonical, backend-agnostic generation types
//!
//! Every backend binding normalizes into these shapes so callers never see
//! vendor wire formats.

pub mod message;
pub mod response;
pub mod stream;
pub mod tool;

pub use message::{Content, ContentPart, FunctionCall, ImageUrl, Message, Role, ToolCall};
pub use response::{Choice, FinishReason, GenerationResult, Usage};
pub use stream::{StreamAbort, StreamEvent, StreamFunctionCall, StreamMeta, StreamToolCall, StreamUpdate};
pub use tool::{
    FunctionCallChoice, FunctionCallMode, FunctionDefinition, FunctionName, NamedToolChoice, ToolChoice,
    ToolChoiceMode, ToolDefinition,
};
