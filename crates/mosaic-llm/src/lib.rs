//! Backend-agnostic text generation for Mosaic
//!
//! Accepts untyped generation requests, validates them against a backend
//! schema, drives the backend's blocking or streaming chat protocol with
//! bounded retries and timeouts, and returns canonical results or a lazy
//! sequence of canonical stream events.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod error;
pub mod health;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod transport;
pub mod types;
pub mod usage;
pub mod validate;

pub use error::{LlmError, TransportFailure};
pub use health::{CredentialStore, StaticCredentials};
pub use provider::openai::OpenAiProvider;
pub use provider::{EventStream, GenerationParams, Provider};
pub use registry::ProviderRegistry;
pub use types::{GenerationResult, StreamEvent, Usage};
pub use validate::ValidationError;
