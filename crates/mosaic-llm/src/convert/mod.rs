//! Mapping from backend wire formats to canonical types
//!
//! Each submodule handles one backend protocol.

pub mod openai;

use crate::types::{Choice, StreamUpdate, Usage};

/// A whole response mapped to canonical shapes
///
/// Usage is only present when the backend reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedResponse {
    pub id: Option<String>,
    pub choices: Vec<Choice>,
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

impl NormalizedResponse {
    /// Text of every choice, concatenated in order
    pub fn completion_text(&self) -> String {
        self.choices.iter().map(|c| c.text.as_str()).collect()
    }
}

/// One streamed chunk mapped to canonical shapes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedChunk {
    /// Incremental output, absent for chunks that carry none
    pub update: Option<StreamUpdate>,
    /// Usage reported by the backend on this chunk
    pub usage: Option<Usage>,
    /// Error the backend reported in place of output; the stream is over
    pub error: Option<String>,
}
