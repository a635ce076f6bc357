//! Token usage accounting
//!
//! Streams rarely report usage, so counts are recomputed from the full
//! message list and the accumulated completion once the stream ends. An
//! unknown model or a broken encoding degrades to an estimate that is
//! logged and marked approximate, never to a failed request.

use std::sync::LazyLock;

use thiserror::Error;
use tiktoken_rs::CoreBPE;
use tiktoken_rs::tokenizer::{Tokenizer, get_tokenizer};

use crate::types::{Message, Usage};

/// Framing tokens added around every chat message
const TOKENS_PER_MESSAGE: u32 = 3;
/// Extra token when a message carries a participant name
const TOKENS_PER_NAME: u32 = 1;
/// Tokens priming the assistant reply
const REPLY_PRIMING_TOKENS: u32 = 3;
/// Characters per token used by the last-resort estimate
const CHARS_PER_TOKEN: u32 = 4;

static O200K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::o200k_base().ok());
static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::cl100k_base().ok());
static P50K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::p50k_base().ok());
static R50K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::r50k_base().ok());

/// Tokenizer failure; never escapes the accountant
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("encoding {0} could not be loaded")]
    EncodingUnavailable(&'static str),
}

/// Token count plus whether it is exact for the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTally {
    pub tokens: u32,
    pub approximate: bool,
}

/// Counts tokens the way a backend bills them
pub trait TokenCounter: Send + Sync {
    /// Tokens of a prompt, including chat framing
    fn count_messages(&self, model: &str, messages: &[Message]) -> Result<TokenTally, UsageError>;

    /// Tokens of a completion text
    fn count_text(&self, model: &str, text: &str) -> Result<TokenTally, UsageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    O200k,
    Cl100k,
    P50k,
    R50k,
}

impl Encoding {
    /// Encoding for `model`, and whether it had to be guessed
    fn for_model(model: &str) -> (Self, bool) {
        match get_tokenizer(model) {
            Some(Tokenizer::O200kBase) => (Self::O200k, false),
            Some(Tokenizer::Cl100kBase) => (Self::Cl100k, false),
            Some(Tokenizer::P50kBase | Tokenizer::P50kEdit) => (Self::P50k, false),
            Some(Tokenizer::R50kBase | Tokenizer::Gpt2) => (Self::R50k, false),
            #[allow(unreachable_patterns)]
            Some(_) | None => {
                tracing::warn!(model, "no known encoding for model, falling back to o200k_base");
                (Self::O200k, true)
            }
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::O200k => "o200k_base",
            Self::Cl100k => "cl100k_base",
            Self::P50k => "p50k_base",
            Self::R50k => "r50k_base",
        }
    }

    fn bpe(self) -> Result<&'static CoreBPE, UsageError> {
        let table = match self {
            Self::O200k => &*O200K,
            Self::Cl100k => &*CL100K,
            Self::P50k => &*P50K,
            Self::R50k => &*R50K,
        };
        table.as_ref().ok_or(UsageError::EncodingUnavailable(self.name()))
    }
}

/// Counts with the backend's official BPE tables
#[derive(Debug, Clone, Copy, Default)]
pub struct TiktokenCounter;

impl TokenCounter for TiktokenCounter {
    fn count_messages(&self, model: &str, messages: &[Message]) -> Result<TokenTally, UsageError> {
        let (encoding, approximate) = Encoding::for_model(model);
        let bpe = encoding.bpe()?;
        let count = |text: &str| saturating_u32(bpe.encode_with_special_tokens(text).len());

        let mut tokens = REPLY_PRIMING_TOKENS;
        for message in messages {
            tokens = tokens
                .saturating_add(TOKENS_PER_MESSAGE)
                .saturating_add(count(message.role.as_str()))
                .saturating_add(count(&message.text_content()));
            if let Some(name) = &message.name {
                tokens = tokens.saturating_add(TOKENS_PER_NAME).saturating_add(count(name));
            }
        }

        Ok(TokenTally { tokens, approximate })
    }

    fn count_text(&self, model: &str, text: &str) -> Result<TokenTally, UsageError> {
        let (encoding, approximate) = Encoding::for_model(model);
        let tokens = saturating_u32(encoding.bpe()?.encode_with_special_tokens(text).len());
        Ok(TokenTally { tokens, approximate })
    }
}

/// Usage for a prompt and its completion
///
/// Falls back to a character estimate when the counter fails; the result is
/// then marked approximate.
pub fn usage(counter: &dyn TokenCounter, messages: &[Message], completion: &str, model: &str) -> Usage {
    let prompt = counter.count_messages(model, messages).unwrap_or_else(|e| {
        tracing::warn!(model, error = %e, "prompt token count failed, estimating from characters");
        estimate_messages(messages)
    });
    let completion = counter.count_text(model, completion).unwrap_or_else(|e| {
        tracing::warn!(model, error = %e, "completion token count failed, estimating from characters");
        estimate(completion)
    });

    let usage = Usage::new(prompt.tokens, completion.tokens);
    if prompt.approximate || completion.approximate {
        usage.approximated()
    } else {
        usage
    }
}

fn estimate(text: &str) -> TokenTally {
    TokenTally {
        tokens: saturating_u32(text.chars().count()).div_ceil(CHARS_PER_TOKEN),
        approximate: true,
    }
}

fn estimate_messages(messages: &[Message]) -> TokenTally {
    let tokens = messages.iter().fold(REPLY_PRIMING_TOKENS, |acc, message| {
        acc.saturating_add(TOKENS_PER_MESSAGE)
            .saturating_add(estimate(&message.text_content()).tokens)
    });

    TokenTally {
        tokens,
        approximate: true,
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
