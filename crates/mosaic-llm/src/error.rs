use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::validate::ValidationError;

/// Errors that terminate a generation request
///
/// Every variant is scoped to the request that produced it; nothing here
/// is shared across requests. Failures after a stream started are not
/// errors of the call: they arrive as [`crate::StreamEvent::Error`].
#[derive(Debug, Error)]
pub enum LlmError {
    /// Raw parameters did not satisfy the backend schema
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Transient backend failure that outlived the retry budget
    #[error("transport failed after {attempts} attempt(s): {cause}")]
    Transport {
        /// Attempts made, including the first
        attempts: u32,
        /// Failure observed on the last attempt
        #[source]
        cause: TransportFailure,
    },

    /// Backend refused the request (bad model, content policy, auth)
    #[error("backend rejected request with status {status}: {message}")]
    BackendRejection {
        /// HTTP status reported by the backend
        status: u16,
        /// Backend-provided explanation
        message: String,
    },
}

impl LlmError {
    /// Terminal error for a failed transport attempt
    ///
    /// Backend rejections keep their status; everything else is reported
    /// together with the number of attempts spent.
    pub fn from_failure(failure: TransportFailure, attempts: u32) -> Self {
        match failure {
            TransportFailure::Status { status, message } if !TransportFailure::is_transient_status(status) => {
                Self::BackendRejection { status, message }
            }
            cause => Self::Transport { attempts, cause },
        }
    }

    /// HTTP status a routing layer should answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Transport {
                cause: TransportFailure::Timeout(_),
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport { .. } => StatusCode::BAD_GATEWAY,
            Self::BackendRejection { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Machine-readable error type (e.g. `invalid_request_error`)
    pub fn error_type(&self) -> &str {
        match self {
            Self::Validation(_) => "invalid_request_error",
            Self::Transport { .. } => "transport_error",
            Self::BackendRejection { .. } => "backend_rejection_error",
        }
    }

    /// Message safe to expose to API consumers
    ///
    /// Transport causes are reduced to their kind.
    pub fn client_message(&self) -> String {
        match self {
            Self::Transport {
                cause: TransportFailure::Timeout(_),
                ..
            } => "backend timed out".to_owned(),
            Self::Transport { .. } => "backend unavailable".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Failure of a single transport attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// Connection, DNS, TLS or body read failure
    #[error("network error: {0}")]
    Network(String),

    /// Attempt exceeded its time budget
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the body
        message: String,
    },

    /// Response body could not be decoded
    #[error("failed to decode backend response: {0}")]
    Decode(String),

    /// Error object sent inside an otherwise successful stream
    #[error("backend reported an error: {0}")]
    Backend(String),
}

impl TransportFailure {
    /// Whether another attempt may succeed
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Backend(_) => true,
            Self::Status { status, .. } => Self::is_transient_status(*status),
            Self::Decode(_) => false,
        }
    }

    /// Server errors, request timeouts and throttling are worth retrying
    pub const fn is_transient_status(status: u16) -> bool {
        status >= 500 || status == 408 || status == 429
    }
}
